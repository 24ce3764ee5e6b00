//! Error type for the visit-analytics loaders.
//!
//! Aggregation itself never fails: malformed records are absorbed where they
//! are read. Errors only surface from whole-file or whole-source operations
//! (an unreadable gazetteer, a GeoJSON document that is not JSON, a failed
//! HTTP fetch), and callers usually degrade those to empty reference data.

use std::fmt;

/// Error type for visit-analytics loaders.
#[derive(Debug, Clone)]
pub enum VisitError {
    /// Reading a file or stream failed
    Io { path: String, message: String },
    /// Gazetteer table could not be read at all
    GazetteerParse { message: String },
    /// GeoJSON document is not a usable FeatureCollection
    GeoJson { message: String },
    /// Ping source could not be read
    PingSource { message: String },
    /// HTTP/API error
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Configuration error
    Config { message: String },
}

impl fmt::Display for VisitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisitError::Io { path, message } => {
                write!(f, "Failed to read '{}': {}", path, message)
            }
            VisitError::GazetteerParse { message } => {
                write!(f, "Gazetteer parse error: {}", message)
            }
            VisitError::GeoJson { message } => {
                write!(f, "GeoJSON error: {}", message)
            }
            VisitError::PingSource { message } => {
                write!(f, "Ping source error: {}", message)
            }
            VisitError::Http {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            VisitError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for VisitError {}

impl From<serde_json::Error> for VisitError {
    fn from(err: serde_json::Error) -> Self {
        VisitError::GeoJson {
            message: err.to_string(),
        }
    }
}

/// Result type alias for visit-analytics operations.
pub type Result<T> = std::result::Result<T, VisitError>;
