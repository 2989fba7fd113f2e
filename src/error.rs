use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown show: {0}")]
    UnknownShow(String),

    #[error("No shows configured")]
    NoShowsConfigured,

    #[error("No extractor registered for show {0}")]
    UnknownExtractor(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// A show's listing could not be fetched or no longer has the expected shape.
#[derive(Error, Debug, Clone)]
#[error("{show}: {cause}")]
pub struct ExtractionError {
    pub show: String,
    pub cause: ExtractionCause,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionCause {
    #[error("failed to load {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("structural anchor `{anchor}` missing on {url}")]
    AnchorMissing { url: String, anchor: String },

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl ExtractionError {
    pub fn new(show: impl Into<String>, cause: ExtractionCause) -> Self {
        Self {
            show: show.into(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_display() {
        let err =
            ExtractionError::new("illner", ExtractionCause::Timeout(Duration::from_millis(250)));
        assert_eq!(err.to_string(), "illner: timed out after 250ms");

        let err = ExtractionError::new(
            "lanz",
            ExtractionCause::HttpStatus {
                url: "http://localhost/lanz".into(),
                status: 503,
            },
        );
        assert_eq!(err.to_string(), "lanz: HTTP 503 from http://localhost/lanz");
    }
}
