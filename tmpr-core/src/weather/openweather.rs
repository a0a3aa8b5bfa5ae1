use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    Context, Coordinates, Error, Result, ResultExt, Unit, Weather, http::get_json,
    weather::WeatherProvider,
};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Validated OpenWeather settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenWeatherConfig {
    api_key: String,
    unit: Unit,
}

impl OpenWeatherConfig {
    /// `unit` is parsed with [`Unit::from_str`](std::str::FromStr): an empty
    /// string means [`Unit::Standard`], anything unknown is a config error.
    pub fn new(api_key: impl Into<String>, unit: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config("no OpenWeather API key provided".into()));
        }

        let unit = unit
            .parse()
            .map_err(|e: Error| e.context("could not validate OpenWeather config"))?;

        Ok(Self { api_key, unit })
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    config: OpenWeatherConfig,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(config: OpenWeatherConfig) -> Self {
        Self {
            config,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn unit(&self) -> Unit {
        self.config.unit
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: i64,
    humidity: i64,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
    weather: Vec<OwCondition>,
}

impl TryFrom<OwCurrentResponse> for Weather {
    type Error = Error;

    fn try_from(parsed: OwCurrentResponse) -> Result<Self> {
        let description = parsed
            .weather
            .into_iter()
            .next()
            .map(|w| w.description)
            .ok_or_else(|| Error::Decode("response contained no weather conditions".into()))?;

        Ok(Weather {
            temperature: parsed.main.temp,
            feels_like: parsed.main.feels_like,
            temp_min: parsed.main.temp_min,
            temp_max: parsed.main.temp_max,
            pressure: parsed.main.pressure,
            humidity: parsed.main.humidity,
            description,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self, ctx))]
    async fn weather_at_coordinates(&self, ctx: &Context, coords: Coordinates) -> Result<Weather> {
        let request = self
            .http
            .get(format!("{}/weather", self.base_url))
            .query(&[
                ("lat", coords.latitude().to_string()),
                ("lon", coords.longitude().to_string()),
                ("appid", self.config.api_key.clone()),
                ("units", self.config.unit.as_str().to_string()),
            ]);

        let parsed: OwCurrentResponse = ctx
            .run(get_json(request))
            .await
            .context("OpenWeather current weather request failed")?;

        let weather =
            Weather::try_from(parsed).context("OpenWeather current weather request failed")?;
        debug!(
            unit = %self.config.unit,
            temperature = weather.temperature,
            description = %weather.description,
            "decoded weather"
        );
        Ok(weather)
    }
}
