//! Bincode codec
//!
//! Uses bincode's serde integration with the standard configuration
//! (little endian, variable-length integers).

use crate::codec::Codec;
use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Compact binary codec backed by `bincode`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(value, bincode::config::standard())?)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> CodecResult<T> {
        let (value, read) = bincode::serde::decode_from_slice(data, bincode::config::standard())?;
        if read != data.len() {
            return Err(CodecError::TrailingData {
                remaining: data.len() - read,
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        tags: Vec<String>,
    }

    #[test]
    fn test_decode_restores_value() {
        let record = Record {
            id: 42,
            tags: vec!["a".to_string(), "b".to_string()],
        };
        let data = BincodeCodec.encode(&record).unwrap();
        let decoded: Record = BincodeCodec.decode(&data).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_trailing_bytes_are_rejected() {
        let mut data = BincodeCodec.encode(&7u64).unwrap();
        data.extend_from_slice(&[0, 0]);
        let result: CodecResult<u64> = BincodeCodec.decode(&data);
        assert!(matches!(result, Err(CodecError::TrailingData { remaining: 2 })));
    }

    #[test]
    fn test_truncated_input_fails() {
        let data = BincodeCodec.encode(&"hello".to_string()).unwrap();
        let result: CodecResult<String> = BincodeCodec.decode(&data[..data.len() - 1]);
        assert!(matches!(result, Err(CodecError::BincodeDecode(_))));
    }
}
