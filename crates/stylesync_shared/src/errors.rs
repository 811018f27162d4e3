//! Error results that can be returned from the engine
use thiserror::Error;

/// Serious errors and errors from third-party libraries
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    IO(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(String),

    #[error("no base breakpoint found, cannot write styles for style source {0}")]
    MissingBaseBreakpoint(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("unknown element for node id {0}")]
    UnknownElement(String),

    #[error("there was a problem: {0}")]
    Generic(String),
}
