use std::io::Write;

use crate::{Error, Forecast, Result};

/// Writes a [`Forecast`] somewhere.
pub trait Presenter {
    fn present(&mut self, forecast: &Forecast) -> Result<()>;
}

/// One JSON object per forecast, newline terminated.
#[derive(Debug)]
pub struct JsonPresenter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonPresenter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Presenter for JsonPresenter<W> {
    fn present(&mut self, forecast: &Forecast) -> Result<()> {
        let encoded = if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, forecast)
        } else {
            serde_json::to_writer(&mut self.writer, forecast)
        };
        encoded.map_err(|e| Error::Output(format!("could not encode forecast as JSON: {e}")))?;

        writeln!(self.writer).map_err(|e| Error::Output(e.to_string()))?;
        self.writer
            .flush()
            .map_err(|e| Error::Output(e.to_string()))
    }
}

/// Single human-readable line:
/// `At 1050, Copenhagen, Denmark it is currently 10.0°, clear sky`.
#[derive(Debug)]
pub struct TextPresenter<W: Write> {
    writer: W,
}

impl<W: Write> TextPresenter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn present(&mut self, forecast: &Forecast) -> Result<()> {
        writeln!(
            self.writer,
            "At {} it is currently {:.1}°, {}",
            forecast.location, forecast.weather.temperature, forecast.weather.description
        )
        .and_then(|()| self.writer.flush())
        .map_err(|e| Error::Output(e.to_string()))
    }
}
