//! Byte representation of session attributes as stored in the store.
//!
//! The format is a JSON object of scalar values. Only [`Attributes`] can be
//! encoded, so a non-string key never reaches the store; what remains to
//! check at encode time are numbers JSON cannot carry.

use snafu::{ResultExt as _, Snafu, ensure};

use crate::{AttrValue, Attributes};

#[derive(Debug, Snafu)]
pub enum EncodeError {
    #[snafu(display("Attribute `{key}` is not a finite number"))]
    NonFiniteNumber { key: String },
    #[snafu(display("Failed to serialize attributes"))]
    Serialize { source: serde_json::Error },
}
pub type EncodeResult<T> = std::result::Result<T, EncodeError>;

#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("Malformed session data"))]
    Malformed { source: serde_json::Error },
}
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

pub fn encode(attributes: &Attributes) -> EncodeResult<Vec<u8>> {
    for (key, value) in attributes {
        if let AttrValue::Float(x) = value {
            ensure!(x.is_finite(), NonFiniteNumberSnafu { key: key.clone() });
        }
    }
    serde_json::to_vec(attributes).context(SerializeSnafu)
}

pub fn decode(bytes: &[u8]) -> DecodeResult<Attributes> {
    serde_json::from_slice(bytes).context(MalformedSnafu)
}

#[cfg(test)]
mod tests;
