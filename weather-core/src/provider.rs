use crate::{
    Config,
    error::LookupError,
    model::{CurrentWeatherReading, ForecastDay, Query},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Read-only access to a weather data service.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions. A place the provider doesn't know is
    /// [`LookupError::NotFound`], never a transport failure.
    async fn fetch_current(&self, query: &Query) -> Result<CurrentWeatherReading, LookupError>;

    /// Noon samples of the multi-day forecast, in chronological order.
    async fn fetch_forecast(&self, query: &Query) -> Result<Vec<ForecastDay>, LookupError>;
}

/// Construct the provider client from config.
///
/// The API key is not checked here; without one every request is
/// rejected by the provider and surfaces as a lookup error.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    if !config.is_api_key_configured() {
        tracing::warn!("no API key configured; requests will be rejected by the provider");
    }

    let client = OpenWeatherClient::new(config.api_key_or_empty().to_owned(), &config.api_base_url)?;
    Ok(Box::new(client))
}
