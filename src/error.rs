//! Error types for the fee clients and the store.

use thiserror::Error;

use crate::store::Lifecycle;

/// Failure of a single upstream fetch (gateway or price index).
#[derive(Error, Debug)]
pub enum GasError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for GasError {
    fn from(err: serde_json::Error) -> Self {
        GasError::Parse(err.to_string())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("store already initialized (state: {0:?})")]
    AlreadyInitialized(Lifecycle),
}
