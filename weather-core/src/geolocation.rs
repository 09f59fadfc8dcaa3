//! Single-shot lookup of the host's current position.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{config::GeolocationConfig, error::GeolocationError, model::Coordinates};

#[async_trait]
pub trait Geolocator: Send + Sync + std::fmt::Debug {
    /// Resolve the current position once. There is no watch mode.
    async fn locate(&self) -> Result<Coordinates, GeolocationError>;

    /// Whether the capability exists at all. When false, `locate` fails
    /// immediately with [`GeolocationError::Unsupported`].
    fn is_supported(&self) -> bool {
        true
    }
}

/// Locates the host by its public IP address.
#[derive(Debug, Clone)]
pub struct IpGeolocator {
    endpoint: Option<String>,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpGeolocator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            http: Client::new(),
        }
    }

    /// A locator for a host without the capability.
    pub fn unsupported() -> Self {
        Self {
            endpoint: None,
            http: Client::new(),
        }
    }

    pub fn from_config(config: &GeolocationConfig) -> Self {
        if config.enabled {
            Self::new(config.endpoint.clone())
        } else {
            Self::unsupported()
        }
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Coordinates, GeolocationError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(GeolocationError::Unsupported);
        };

        tracing::debug!(endpoint, "locating host");

        let res = self
            .http
            .get(endpoint)
            .send()
            .await
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(GeolocationError::PositionUnavailable(format!(
                "locator returned status {}",
                res.status()
            )));
        }

        let body: IpApiResponse = res
            .json()
            .await
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;

        if body.status != "success" {
            return Err(GeolocationError::Denied(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates { lat, lon }),
            _ => Err(GeolocationError::PositionUnavailable(
                "locator response missing coordinates".to_string(),
            )),
        }
    }

    fn is_supported(&self) -> bool {
        self.endpoint.is_some()
    }
}
