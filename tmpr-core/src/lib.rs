//! Core library for the `tmpr` weather CLI.
//!
//! This crate defines:
//! - Shared domain models (coordinates, locations, weather readings, forecasts)
//! - A cancellable operation [`Context`] threaded through every network call
//! - Capability traits for geolocation and weather lookups, with LocationIQ
//!   and OpenWeather implementations
//! - The [`ForecastService`] orchestrator and output presenters
//! - Credential and default-unit configuration
//!
//! It is used by `tmpr-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod context;
pub mod error;
pub mod forecast;
pub mod geo;
mod http;
pub mod model;
pub mod present;
pub mod weather;

pub use config::{Config, ProviderConfig, ProviderId};
pub use context::Context;
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use forecast::{ForecastService, Forecaster};
pub use geo::{Geolocator, LocationIqGeolocator};
pub use model::{Coordinates, Forecast, Location, Unit, Weather};
pub use present::{JsonPresenter, Presenter, TextPresenter};
pub use weather::{OpenWeatherConfig, OpenWeatherProvider, WeatherProvider};
