//! Application-level error type shared by the binary and services.

use thiserror::Error;

use crate::config;
use crate::services::OracleError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] config::AppConfigError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
}
