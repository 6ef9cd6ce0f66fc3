//!
//! src/errors.rs
//!
//! Defines the error enum and conversions used across the import
//! pipeline. Only `NotFound` ever escapes `import_artist`, every other
//! variant is caught at a step boundary and turned into a trace line
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("rate limited: retry {0:?}")]
    RateLimited(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("db error: {0}")]
    Db(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl ImportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImportError::NotFound(_))
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(e: reqwest::Error) -> Self { ImportError::Http(e.to_string()) }
}

impl From<serde_json::Error> for ImportError {
    fn from(e: serde_json::Error) -> Self { ImportError::Parse(e.to_string()) }
}

impl From<sqlx::Error> for ImportError {
    fn from(e: sqlx::Error) -> Self { ImportError::Db(e.to_string()) }
}

impl From<url::ParseError> for ImportError {
    fn from(e: url::ParseError) -> Self { ImportError::Parse(format!("url: {e}")) }
}
