use thiserror::Error;

/// Fatal configuration problems. These are raised before any record is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown source tag: {0}")]
    UnknownSource(String),

    #[error("Unknown country code: {0}")]
    UnknownCountry(String),

    #[error("Invalid filter stage '{stage}': {message}")]
    InvalidStage { stage: String, message: String },

    #[error("Invalid country profile '{code}': {message}")]
    InvalidCountry { code: String, message: String },

    #[error("Failed to read config file '{path}': {message}")]
    Unreadable { path: String, message: String },

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A single raw record that could not be turned into a Lead. Recovered by skipping it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Record is not a JSON object (found {0})")]
    NotAnObject(&'static str),

    #[error("Canonical record could not be read: {0}")]
    Canonical(String),
}

/// A failed company lookup. Recovered by leaving the affected leads uncertain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse lookup response: {0}")]
    Parse(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Lookup task failed: {0}")]
    TaskFailed(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Parse(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConsolidationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Failed to write output: {0}")]
    Output(String),
}

pub type Result<T> = std::result::Result<T, ConsolidationError>;
