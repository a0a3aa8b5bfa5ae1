use async_trait::async_trait;
use std::fmt::Debug;

use crate::{Context, Coordinates, Result, Weather};

pub mod openweather;

pub use openweather::{OpenWeatherConfig, OpenWeatherProvider};

/// Source of current conditions at a point.
///
/// Same cancellation and error conventions as [`crate::Geolocator`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn weather_at_coordinates(&self, ctx: &Context, coords: Coordinates) -> Result<Weather>;
}
