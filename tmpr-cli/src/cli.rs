use std::{io, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tmpr_core::{
    Config, Context, Coordinates, ForecastService, Forecaster, JsonPresenter, LocationIqGeolocator,
    OpenWeatherConfig, OpenWeatherProvider, Presenter, ProviderId, TextPresenter,
};
use tracing::{debug, warn};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "tmpr", version, about = "Current weather for a place or a coordinate")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Unit system: standard (Kelvin), metric or imperial. Defaults to the
    /// configured unit, then standard.
    #[arg(long, global = true)]
    pub unit: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Output::Text, global = true)]
    pub output: Output,

    /// Indent JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Give up after this many seconds (0 waits indefinitely).
    #[arg(long, default_value_t = 10, global = true)]
    pub timeout: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Output {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the weather at a longitude/latitude pair.
    Coord {
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
    },

    /// Show the weather for a place, e.g. a city or an address.
    Query {
        #[arg(short, long)]
        query: String,
    },

    /// Store the API key for a provider ("openweather" or "locationiq").
    Configure { provider: String },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { ref provider } => configure(Config::load()?, provider),
            Command::Coord { lon, lat } => {
                let coords = Coordinates::new(lon, lat)?;
                let config = Config::load_if_needed(self.unit.as_deref())?;
                let forecaster = build_forecaster(&config, self.unit.as_deref())?;
                let ctx = root_context(self.timeout);

                let forecast = forecaster
                    .forecast_at_coordinates(&ctx, coords)
                    .await
                    .with_context(|| format!("could not get forecast at {coords}"))?;
                present(self.output, self.pretty, &forecast)
            }
            Command::Query { ref query } => {
                let config = Config::load_if_needed(self.unit.as_deref())?;
                let forecaster = build_forecaster(&config, self.unit.as_deref())?;
                let ctx = root_context(self.timeout);

                let forecast = forecaster
                    .forecast_at_query(&ctx, query)
                    .await
                    .with_context(|| format!("could not get forecast for {query:?}"))?;
                present(self.output, self.pretty, &forecast)
            }
        }
    }
}

/// Validates units and credentials before anything touches the network.
fn build_forecaster(config: &Config, unit: Option<&str>) -> anyhow::Result<ForecastService> {
    let unit = config.resolve_unit(unit)?;
    let weather_key = config.api_key(ProviderId::OpenWeather)?;
    let geo_key = config.api_key(ProviderId::LocationIq)?;

    let weather = OpenWeatherProvider::new(OpenWeatherConfig::new(weather_key, unit.as_str())?);
    let geolocator = LocationIqGeolocator::new(geo_key)?;
    debug!(unit = %weather.unit(), "forecaster ready");

    Ok(ForecastService::new(Box::new(geolocator), Box::new(weather)))
}

/// The only deadline in the program; Ctrl-C cancels it as well.
fn root_context(timeout_secs: u64) -> Context {
    let ctx = match timeout_secs {
        0 => Context::background(),
        secs => Context::background().with_timeout(Duration::from_secs(secs)),
    };

    let on_interrupt = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling outstanding requests");
            on_interrupt.cancel();
        }
    });

    ctx
}

fn present(output: Output, pretty: bool, forecast: &tmpr_core::Forecast) -> anyhow::Result<()> {
    let stdout = io::stdout().lock();
    let mut presenter: Box<dyn Presenter> = match output {
        Output::Text => Box::new(TextPresenter::new(stdout)),
        Output::Json => Box::new(JsonPresenter::new(stdout).pretty(pretty)),
    };

    presenter.present(forecast)?;
    Ok(())
}

fn configure(mut config: Config, provider: &str) -> anyhow::Result<()> {
    let id: ProviderId = provider.parse()?;

    let api_key = inquire::Password::new(&format!("{id} API key:"))
        .without_confirmation()
        .with_help_message(&format!("Stored in the config file; {} takes precedence", id.env_var()))
        .prompt()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.trim().to_string());
    let path = config.save()?;
    println!("Saved {id} API key to {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["tmpr", "coord", "--lon", "-74.006", "--lat", "40.7128"])
            .unwrap();

        match cli.command {
            Command::Coord { lon, lat } => {
                assert_eq!(lon, -74.006);
                assert_eq!(lat, 40.7128);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.output, Output::Text);
        assert!(!cli.pretty);
        assert_eq!(cli.timeout, 10);
    }

    #[test]
    fn coord_requires_both_flags() {
        assert!(Cli::try_parse_from(["tmpr", "coord", "--lon", "12.57"]).is_err());
    }

    #[test]
    fn query_accepts_short_flag_and_global_options() {
        let cli = Cli::try_parse_from([
            "tmpr", "query", "-q", "Copenhagen", "--unit", "metric", "--output", "json",
            "--pretty",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Query { ref query } if query == "Copenhagen"));
        assert_eq!(cli.unit.as_deref(), Some("metric"));
        assert_eq!(cli.output, Output::Json);
        assert!(cli.pretty);
    }

    #[test]
    fn query_is_required() {
        assert!(Cli::try_parse_from(["tmpr", "query"]).is_err());
    }

    #[test]
    fn invalid_unit_fails_before_credentials() {
        let err = build_forecaster(&Config::default(), Some("bogus")).unwrap_err();
        assert!(err.to_string().contains("invalid unit"));
    }
}
