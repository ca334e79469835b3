use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Capture Error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Engine Error: {0}")]
    Engine(String),
    #[error("Engine command channel closed")]
    ChannelClosed,
}

// Capture Error Type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Camera hardware reported an error: {0}")]
    Hardware(String),
    #[error("Capture did not complete within {0}ms")]
    Timeout(u64),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid {section} configuration: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section,
            reason: reason.into(),
        }
    }
}
