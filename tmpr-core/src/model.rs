use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A point on the globe, always within the valid longitude/latitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    longitude: f64,
    latitude: f64,
}

#[derive(Deserialize)]
struct RawCoordinates {
    longitude: f64,
    latitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = Error;

    fn try_from(raw: RawCoordinates) -> Result<Self> {
        Coordinates::new(raw.longitude, raw.latitude)
    }
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude {longitude} is outside [-180, 180]"
            )));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude {latitude} is outside [-90, 90]"
            )));
        }

        Ok(Self { longitude, latitude })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.longitude, self.latitude)
    }
}

/// A place as resolved by a [`crate::Geolocator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub display_name: String,
    pub city: String,
    pub country: String,
    pub postcode: String,
    pub coordinates: Coordinates,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.postcode, self.city, self.country)
    }
}

/// Current conditions. Values are expressed in whatever [`Unit`] the
/// provider was configured with; the reading itself carries no unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: i64,
    pub humidity: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: Location,
    pub weather: Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    /// Kelvin.
    #[default]
    Standard,
    /// Celsius.
    Metric,
    /// Fahrenheit.
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Standard => "standard",
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [Unit] {
        &[Unit::Standard, Unit::Metric, Unit::Imperial]
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = Error;

    /// An empty string means "unset" and falls back to [`Unit::Standard`].
    fn from_str(value: &str) -> Result<Self> {
        match value {
            "" | "standard" => Ok(Unit::Standard),
            "metric" => Ok(Unit::Metric),
            "imperial" => Ok(Unit::Imperial),
            _ => Err(Error::Config(format!(
                "invalid unit {value:?}, needs to be standard, metric or imperial"
            ))),
        }
    }
}
