use thiserror::Error;

/// Errors raised while loading or validating simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid colour {0:?}, expected #rgb, #rgba, #rrggbb or #rrggbbaa")]
    InvalidColor(String),
    #[error("{name} must be finite and greater than zero, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("global_alpha must lie in [0, 1], got {0}")]
    AlphaOutOfRange(f32),
}

/// Errors returned by [`crate::host::HostHandle`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("simulation host has shut down")]
    Disconnected,
}
