use thiserror::Error;

/// Main error type for the vigil process watcher
#[derive(Debug, Error)]
pub enum VigilError {
    // Process-related errors
    #[error("Failed to run command `{0}`: {1}")]
    CommandError(String, String),

    #[error("Failed to signal process {0}: {1}")]
    SignalError(u32, String),

    // Sampler errors
    #[error("Failed to sample process table: {0}")]
    SamplerError(String),

    // State store errors
    #[error("Failed to load state: {0}")]
    StateLoadError(String),

    #[error("Failed to save state: {0}")]
    StateSaveError(String),

    #[error("Failed to lock state file: {0}")]
    StateLockError(String),

    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Missing required configuration field: {0}")]
    MissingConfigField(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Notification errors
    #[error("Notification failed: {0}")]
    NotifyError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
