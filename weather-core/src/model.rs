use serde::{Deserialize, Serialize};
use std::fmt;

/// What a single lookup asks the provider for.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    City(String),
    Coordinates(Coordinates),
}

impl Query {
    /// Query parameters identifying the place, without credentials.
    pub fn location_params(&self) -> Vec<(&'static str, String)> {
        match self {
            Query::City(name) => vec![("q", name.clone())],
            Query::Coordinates(c) => vec![("lat", c.lat.to_string()), ("lon", c.lon.to_string())],
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::City(name) => f.write_str(name),
            Query::Coordinates(c) => write!(f, "{},{}", c.lat, c.lon),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeatherReading {
    pub location_name: String,
    pub country_code: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub description: String,
    pub icon_code: String,
}

/// One forecast entry per calendar day, taken from the noon sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// Short weekday name, e.g. "Mon".
    pub day_label: String,
    pub icon_code: String,
    pub description: String,
    pub temperature_c: f64,
}
