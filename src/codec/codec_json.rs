//! JSON codec

use crate::codec::Codec;
use crate::error::CodecResult;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON codec backed by `serde_json`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> CodecResult<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Foo {
        bar: String,
    }

    #[test]
    fn test_encodes_plain_json_document() {
        let data = JsonCodec
            .encode(&Foo {
                bar: "baz".to_string(),
            })
            .unwrap();
        assert_eq!(data, br#"{"bar":"baz"}"#);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let result: CodecResult<Foo> = JsonCodec.decode(br#"{"qux":1}"#);
        assert!(result.is_err());

        let result: CodecResult<Foo> = JsonCodec.decode(b"not json");
        assert!(result.is_err());
    }

    #[test]
    fn test_non_string_map_keys_fail_to_encode() {
        let mut map = HashMap::new();
        map.insert(vec![1u8, 2], "value");
        assert!(JsonCodec.encode(&map).is_err());
    }
}
