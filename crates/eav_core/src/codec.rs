//! Structured attribute value encoding.
//!
//! # Responsibility
//! - Convert structured values to the text stored in `attribute_value`.
//! - Report decode failures instead of producing a substitute value.
//!
//! # Invariants
//! - `decode(encode(v)) == v` for every `serde_json::Value`. Floats rely on
//!   `serde_json`'s `float_roundtrip` parser to come back bit-identical.

use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CodecResult<T> = Result<T, CodecError>;

/// Serializer failure for one attribute value.
#[derive(Debug)]
pub enum CodecError {
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    /// Failure reported by a non-JSON serializer implementation.
    Custom(String),
}

impl Display for CodecError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "failed to encode attribute value: {err}"),
            Self::Decode(err) => write!(f, "failed to decode attribute value: {err}"),
            Self::Custom(message) => write!(f, "attribute value codec error: {message}"),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::Custom(_) => None,
        }
    }
}

/// Text encoding for structured attribute values.
pub trait ValueSerializer {
    fn encode(&self, value: &Value) -> CodecResult<String>;
    fn decode(&self, raw: &str) -> CodecResult<Value>;
}

/// Compact JSON text, the default attribute value encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl ValueSerializer for JsonSerializer {
    fn encode(&self, value: &Value) -> CodecResult<String> {
        serde_json::to_string(value).map_err(CodecError::Encode)
    }

    fn decode(&self, raw: &str) -> CodecResult<Value> {
        serde_json::from_str(raw).map_err(CodecError::Decode)
    }
}
