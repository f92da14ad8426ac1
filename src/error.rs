//! Error type shared by the metrics library.
//!
//! Most input problems in this crate are recoverable by design (a missing or
//! unparsable report is "no data", not a failure); this type covers the cases
//! that must propagate, chiefly snapshot-store writes.

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot store: {0}")]
    Store(String),

    #[error("validation: {0}")]
    Validation(String),
}

impl Error {
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
