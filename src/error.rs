use thiserror::Error;

/// Failures the harvest engine and its collaborators can run into.
///
/// Parse misses are not represented here: the pattern functions return empty
/// values instead of failing.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Page load did not reach a usable result feed.
    #[error("navigation to {url} failed after {attempts} attempt(s): {reason}")]
    Navigation {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The automation handle is gone or unusable.
    #[error("browser session failure: {0}")]
    Session(String),

    /// A single list item could not be read.
    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl HarvestError {
    /// Errors that warrant discarding the browser session and retrying the category.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, HarvestError::Navigation { .. } | HarvestError::Session(_))
    }
}

pub type HarvestResult<T> = Result<T, HarvestError>;
