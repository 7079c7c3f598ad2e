//! Marshal strategies: what the bytes of a message mean.

use std::fmt;

use serde::de::value::{Error as ValueError, SeqDeserializer};
use serde::de::{self, Deserializer, Visitor};
use serde::forward_to_deserialize_any;
use serde_json::Value;

use crate::error::{CodecError, CodecResult};

/// Serialization strategy for structured values.
///
/// Structured values travel through the codec as [`serde_json::Value`], which
/// keeps the trait object-safe so a [`WireCodec`](super::WireCodec) can hold
/// any strategy behind an `Arc`.
pub trait Marshal: Send + Sync + fmt::Debug {
    /// Short strategy name used in error messages.
    fn name(&self) -> &'static str;

    /// Serializes a structured value to bytes.
    fn marshal(&self, value: &Value) -> CodecResult<Vec<u8>>;

    /// Deserializes bytes into a structured value.
    fn unmarshal(&self, data: &[u8]) -> CodecResult<Value>;

    /// Produces the payload for a byte-sequence target.
    ///
    /// The default hands over the payload as it arrived after decryption.
    fn unmarshal_bytes(&self, data: Vec<u8>) -> CodecResult<Vec<u8>> {
        Ok(data)
    }

    /// Whether typed decoding binds the payload bytes directly instead of
    /// going through [`unmarshal`](Marshal::unmarshal).
    fn binds_bytes(&self) -> bool {
        false
    }
}

/// JSON marshal strategy backed by `serde_json`.
///
/// Typed targets always go through JSON, so `Vec<u8>` decodes from a JSON
/// array of numbers. [`WireCodec::decode_bytes`](super::WireCodec::decode_bytes)
/// keeps the default [`Marshal::unmarshal_bytes`] and returns the payload
/// bytes unparsed; adapters read JSON text that way.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshal;

impl Marshal for JsonMarshal {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal(&self, value: &Value) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::marshal(self.name(), e))
    }

    fn unmarshal(&self, data: &[u8]) -> CodecResult<Value> {
        serde_json::from_slice(data).map_err(|e| CodecError::marshal(self.name(), e))
    }
}

/// Passthrough strategy for raw byte payloads.
///
/// Structured values are still serialized as JSON on the way out, but on the
/// way in only byte targets (`Vec<u8>`, byte buffers and newtypes around
/// them) can be produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMarshal;

impl Marshal for RawMarshal {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn marshal(&self, value: &Value) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CodecError::marshal(self.name(), e))
    }

    fn unmarshal(&self, _data: &[u8]) -> CodecResult<Value> {
        Err(CodecError::TypeMismatch {
            strategy: self.name(),
            target: "a structured value (expected a byte sequence target)",
        })
    }

    fn binds_bytes(&self) -> bool {
        true
    }
}

/// Deserializer that only satisfies byte-sequence targets.
pub(super) struct ByteTarget(pub(super) Vec<u8>);

impl<'de> Deserializer<'de> for ByteTarget {
    type Error = ValueError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("expected a byte sequence target"))
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_byte_buf(self.0)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_byte_buf(self.0)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let mut seq = SeqDeserializer::<_, ValueError>::new(self.0.into_iter());
        let value = visitor.visit_seq(&mut seq)?;
        seq.end()?;
        Ok(value)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        option unit unit_struct tuple tuple_struct map struct enum identifier
        ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_marshal_round_trip() {
        let value = json!({"action": "echo", "body": [1, 2, 3]});
        let bytes = JsonMarshal.marshal(&value).unwrap();
        assert_eq!(JsonMarshal.unmarshal(&bytes).unwrap(), value);
    }

    #[test]
    fn test_json_unmarshal_rejects_garbage() {
        let err = JsonMarshal.unmarshal(b"{not json").unwrap_err();
        assert!(matches!(err, CodecError::Marshal { strategy: "json", .. }));
    }

    #[test]
    fn test_raw_unmarshal_only_accepts_byte_targets() {
        let err = RawMarshal.unmarshal(b"hi").unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { strategy: "raw", .. }));
        assert_eq!(RawMarshal.unmarshal_bytes(b"hi".to_vec()).unwrap(), b"hi");
    }

    #[test]
    fn test_byte_target_accepts_only_byte_sequences() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Payload(Vec<u8>);

        let bytes: Vec<u8> = serde::Deserialize::deserialize(ByteTarget(b"hi".to_vec())).unwrap();
        assert_eq!(bytes, b"hi");

        let payload: Payload = serde::Deserialize::deserialize(ByteTarget(vec![1, 2])).unwrap();
        assert_eq!(payload, Payload(vec![1, 2]));

        assert!(<Value as serde::Deserialize>::deserialize(ByteTarget(b"{}".to_vec())).is_err());
        assert!(<String as serde::Deserialize>::deserialize(ByteTarget(b"hi".to_vec())).is_err());
    }

    #[test]
    fn test_raw_marshal_serializes_structured_values_as_json() {
        let bytes = RawMarshal.marshal(&json!({"k": 1})).unwrap();
        assert_eq!(bytes, br#"{"k":1}"#);
    }
}
