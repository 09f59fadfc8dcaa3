use thiserror::Error;

/// Failures of a provider call. Both end the lookup in the error state.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The provider has no such place.
    #[error("location not found")]
    NotFound,

    /// Network failure, unexpected status or malformed body.
    #[error("transport error: {0}")]
    Transport(String),
}

impl LookupError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        LookupError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeolocationError {
    /// The host has no geolocation capability.
    #[error("geolocation is not supported on this host")]
    Unsupported,

    #[error("geolocation denied: {0}")]
    Denied(String),

    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
}
