//! Public-facing status types. The core never propagates a raw error to the
//! transport layer (spec §7): every public operation returns one of these
//! tagged outcomes instead of a `Result<_, anyhow::Error>`.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("malformed ingress: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum IngestOutcome<T> {
    Ok(T),
    InvalidFormat,
    Error { detail: String },
}

impl<T> IngestOutcome<T> {
    pub fn ok(value: T) -> Self {
        IngestOutcome::Ok(value)
    }
}
