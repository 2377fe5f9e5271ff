use std::io;

use thiserror::Error;

use crate::postings::CodecError;

/// Main error type for cuttle operations
#[derive(Error, Debug)]
pub enum CuttleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("missing or invalid configuration key: {0}")]
    Config(String),

    #[error("malformed libsvm line: {0}")]
    Parse(String),

    #[error("identifier {0} out of range")]
    OutOfRange(u64),
}

/// Result type alias for cuttle operations
pub type Result<T> = std::result::Result<T, CuttleError>;

impl CuttleError {
    /// Check if this error means the on-disk index is unusable and must be
    /// rebuilt from the source corpus
    pub fn requires_rebuild(&self) -> bool {
        matches!(self, CuttleError::Corrupt(_) | CuttleError::Codec(_))
    }
}
