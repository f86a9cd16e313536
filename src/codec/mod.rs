//! Codec module for value encoding and decoding
//!
//! A codec turns a structured value into the exact bytes stored in an object
//! body, and back. The adapter adds no framing around those bytes.
//!
//! Two codecs ship with the crate:
//! - [`JsonCodec`] - the default; object bodies are JSON documents
//! - [`BincodeCodec`] - compact binary encoding for Rust-only consumers

pub mod codec_json;
pub mod codec_bincode;

pub use codec_json::JsonCodec;
pub use codec_bincode::BincodeCodec;

use crate::error::CodecResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Pluggable encode/decode capability
///
/// Codecs are shared read-only between callers, so implementations must not
/// rely on interior state changing between calls.
pub trait Codec: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Encode a value into bytes
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>>;

    /// Decode bytes into a value
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> CodecResult<T>;
}
