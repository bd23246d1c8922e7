mod cbor;

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error as ThisError;

///
/// SerializeError
///

#[derive(Debug, ThisError)]
pub enum SerializeError {
    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("payload of {len} bytes exceeds limit of {max} bytes")]
    TooLarge { len: usize, max: usize },
}

impl SerializeError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Serialize(_) => ErrorClass::Internal,
            Self::Deserialize(_) => ErrorClass::Corruption,
            Self::TooLarge { .. } => ErrorClass::Domain,
        }
    }
}

impl From<SerializeError> for InternalError {
    fn from(err: SerializeError) -> Self {
        Self::new(err.class(), ErrorOrigin::Serialize, err.to_string())
    }
}

/// Serialize a value with the store's blob format, bounded by `max_bytes`.
pub fn serialize<T>(ty: &T, max_bytes: usize) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    let bytes = cbor::serialize(ty)?;
    if bytes.len() > max_bytes {
        return Err(SerializeError::TooLarge {
            len: bytes.len(),
            max: max_bytes,
        });
    }

    Ok(bytes)
}

/// Deserialize a value produced by [`serialize`].
pub fn deserialize<T>(bytes: &[u8], max_bytes: usize) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    cbor::deserialize(bytes, max_bytes)
}
