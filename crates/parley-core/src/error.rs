//! Error types for the message codecs.

use thiserror::Error;

/// Errors raised while encoding or decoding persisted message lists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("Expected a list of messages, found {0}")]
    NotAList(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            CodecError::Malformed(err.to_string())
        } else {
            CodecError::Serialization(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
