//! Error types for the tinta PDF codec and encryption core.

use thiserror::Error;

/// Primary error type for filter and encryption operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("filter {0} does not support this operation")]
    UnsupportedFilter(&'static str),

    #[error("invalid stream: {0}")]
    InvalidStream(String),

    #[error("value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("invalid predictor filter type: {0}")]
    InvalidPredictor(u8),

    #[error("flate error: {0}")]
    Flate(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid encryption dictionary: {0}")]
    InvalidEncryptionDict(String),

    #[error("internal logic: {0}")]
    InternalLogic(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
