use thiserror::Error;

/// Errors that can occur while fetching menus, calling the LLM or persisting data
#[derive(Error, Debug)]
pub enum DiningError {
    /// Failed to reach an upstream portal or LLM endpoint
    #[error("Failed to fetch URL: {0}")]
    FetchError(reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("HTTP error! Status: {0}")]
    UpstreamStatus(u16),

    /// Dining hall name is not in the registry
    #[error("Unknown dining hall: {0}")]
    UnknownDiningHall(String),

    /// A required request field was missing or empty
    #[error("{0} is required")]
    MissingInput(&'static str),

    /// A request field was present but unusable
    #[error("{0}")]
    InvalidInput(String),

    /// LLM call failed or returned an unusable body
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// Meal analysis did not match the expected schema
    #[error("Invalid meal analysis: {0}")]
    InvalidAnalysis(String),

    /// Local file or socket I/O failed
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
}

impl From<reqwest::Error> for DiningError {
    /// Drops the request URL, which may carry credentials.
    fn from(error: reqwest::Error) -> Self {
        DiningError::FetchError(error.without_url())
    }
}
