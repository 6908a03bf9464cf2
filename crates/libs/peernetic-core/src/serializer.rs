//! The opaque bytes ↔ message boundary (spec §6). The framework never
//! mandates a wire format; this crate's default is `rmp-serde`
//! (MessagePack), matching the teacher's pervasive use of it for
//! everything on the wire.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SerializerError {
    #[error("failed to encode payload: {0}")]
    Encode(String),
    #[error("failed to decode payload: {0}")]
    Decode(String),
}

/// Converts a payload to and from bytes.
pub trait Serializer<P> {
    fn encode(&self, payload: &P) -> Result<Vec<u8>, SerializerError>;
    fn decode(&self, bytes: &[u8]) -> Result<P, SerializerError>;
}

/// The default `rmp-serde` (MessagePack) serializer.
pub struct RmpSerializer;

impl<P> Serializer<P> for RmpSerializer
where
    P: Serialize + DeserializeOwned,
{
    fn encode(&self, payload: &P) -> Result<Vec<u8>, SerializerError> {
        rmp_serde::to_vec(payload).map_err(|e| SerializerError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<P, SerializerError> {
        rmp_serde::from_slice(bytes).map_err(|e| SerializerError::Decode(e.to_string()))
    }
}
