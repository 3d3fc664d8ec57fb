// error types shared by every stage of the trainer

use std::path::PathBuf;
use thiserror::Error;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Doc2TopicError>;

#[derive(Error, Debug)]
pub enum Doc2TopicError {
    // A file could not be opened, read or written
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Run parameters failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Lookup of a token that is not part of the filtered vocabulary
    #[error("Unknown token: '{0}' is not in the vocabulary")]
    UnknownToken(String),

    // Encoding or decoding of a persisted structure failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    // The record keys do not match the header of an existing log file
    #[error("Log schema mismatch in {}: expected columns {expected:?}, got {found:?}", .path.display())]
    LogSchema {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    // Array shapes that do not fit together
    #[error("Shape error: {0}")]
    Shape(String),
}

impl Doc2TopicError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn unknown_token(token: impl Into<String>) -> Self {
        Self::UnknownToken(token.into())
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

impl From<serde_json::Error> for Doc2TopicError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<bincode::Error> for Doc2TopicError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<csv::Error> for Doc2TopicError {
    fn from(err: csv::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<ndarray_npy::WriteNpyError> for Doc2TopicError {
    fn from(err: ndarray_npy::WriteNpyError) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<ndarray_npy::ReadNpyError> for Doc2TopicError {
    fn from(err: ndarray_npy::ReadNpyError) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for Doc2TopicError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Shape(err.to_string())
    }
}
