//! Core library for the `weather` client.
//!
//! This crate defines:
//! - Configuration handling
//! - The OpenWeather client behind the [`WeatherProvider`] trait
//! - Last-city persistence and host geolocation
//! - View state with pure render functions, and the lookup pipeline in [`App`]
//!
//! It is used by `weather-cli`, but the [`App`] can be driven by any adapter
//! that renders a [`View`].

pub mod app;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod model;
pub mod provider;
pub mod store;
pub mod view;

pub use app::{App, LookupOutcome};
pub use config::{Config, GeolocationConfig};
pub use error::{GeolocationError, LookupError};
pub use geolocation::{Geolocator, IpGeolocator};
pub use model::{Coordinates, CurrentWeatherReading, ForecastDay, Query};
pub use provider::{WeatherProvider, openweather::OpenWeatherClient};
pub use store::{FileStore, LastCityStore, MemoryStore};
pub use view::{View, ViewState};
