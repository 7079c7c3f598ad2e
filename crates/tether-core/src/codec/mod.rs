//! Wire codec: a marshal strategy composed with an optional crypto strategy.
//!
//! - [`Marshal`] decides what the bytes mean ([`JsonMarshal`], [`RawMarshal`])
//! - [`Crypto`] decides how the bytes are protected ([`ChaChaCrypto`])
//!
//! Encoding always marshals first and encrypts second; decoding always
//! decrypts first and unmarshals second.
//!
//! # Example
//!
//! ```
//! use tether_core::codec::{Frame, FrameKind, Outgoing, WireCodec};
//! use serde_json::json;
//!
//! let codec = WireCodec::json();
//!
//! let frame = codec.encode(&Outgoing::from(json!({"action": "ping"}))).unwrap();
//! assert_eq!(frame.kind, FrameKind::Binary);
//!
//! let value: serde_json::Value = codec.decode(frame).unwrap();
//! assert_eq!(value["action"], "ping");
//! ```

mod crypto;
mod marshal;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use crypto::{ChaChaCrypto, Crypto};
pub use marshal::{JsonMarshal, Marshal, RawMarshal};

use marshal::ByteTarget;

use crate::error::{CodecError, CodecResult};

/// Coarse payload classification carried next to the encoded bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameKind {
    /// Text frame (the default).
    #[default]
    Text,
    /// Binary frame.
    Binary,
}

/// One encoded message as handed to or received from a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Encoded payload.
    pub data: Vec<u8>,
    /// Frame classification.
    pub kind: FrameKind,
}

impl Frame {
    /// Creates a text frame.
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            kind: FrameKind::Text,
        }
    }

    /// Creates a binary frame.
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            kind: FrameKind::Binary,
        }
    }
}

/// A value about to be encoded.
///
/// Raw bytes and strings bypass the marshal strategy; everything else goes
/// through it as a structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Raw bytes, sent unmodified.
    Bytes(Vec<u8>),
    /// UTF-8 text, sent as its bytes unmodified.
    Text(String),
    /// A structured value serialized by the marshal strategy.
    Structured(Value),
}

impl Outgoing {
    /// Converts any serializable value into a structured payload.
    pub fn structured<T: Serialize + ?Sized>(value: &T) -> CodecResult<Self> {
        serde_json::to_value(value)
            .map(Self::Structured)
            .map_err(|e| CodecError::marshal("serde", e))
    }
}

impl From<Vec<u8>> for Outgoing {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}

impl From<&[u8]> for Outgoing {
    fn from(data: &[u8]) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl From<String> for Outgoing {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Outgoing {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for Outgoing {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// Encode/decode pair used by every [`Connection`](crate::Connection).
///
/// Immutable once built and cheap to clone; services share one instance
/// across all of their connections through an `Arc`.
#[derive(Debug, Clone)]
pub struct WireCodec {
    marshal: Arc<dyn Marshal>,
    crypto: Option<Arc<dyn Crypto>>,
}

impl WireCodec {
    /// Creates a codec around a custom marshal strategy, without crypto.
    pub fn new(marshal: impl Marshal + 'static) -> Self {
        Self {
            marshal: Arc::new(marshal),
            crypto: None,
        }
    }

    /// JSON codec, the default for request-mode services.
    pub fn json() -> Self {
        Self::new(JsonMarshal)
    }

    /// Raw byte codec, the default for adapter-mode services.
    pub fn raw() -> Self {
        Self::new(RawMarshal)
    }

    /// Adds a crypto strategy.
    pub fn with_crypto(mut self, crypto: impl Crypto + 'static) -> Self {
        self.crypto = Some(Arc::new(crypto));
        self
    }

    /// Returns the marshal strategy name.
    pub fn marshal_name(&self) -> &'static str {
        self.marshal.name()
    }

    /// Returns `true` if payloads are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.crypto.is_some()
    }

    /// Encodes one outgoing value into a frame.
    pub fn encode(&self, value: &Outgoing) -> CodecResult<Frame> {
        let (data, kind) = match value {
            Outgoing::Bytes(bytes) => (bytes.clone(), FrameKind::Text),
            Outgoing::Text(text) => (text.as_bytes().to_vec(), FrameKind::Text),
            Outgoing::Structured(value) => (self.marshal.marshal(value)?, FrameKind::Binary),
        };

        let data = match &self.crypto {
            Some(crypto) => crypto.encrypt(data)?,
            None => data,
        };

        Ok(Frame { data, kind })
    }

    /// Decodes a frame into a typed target.
    ///
    /// Under a strategy that binds bytes (raw), only byte-sequence targets
    /// such as `Vec<u8>` succeed.
    pub fn decode<T: DeserializeOwned>(&self, frame: Frame) -> CodecResult<T> {
        let data = self.decrypt(frame.data)?;
        if self.marshal.binds_bytes() {
            return <T as serde::Deserialize>::deserialize(ByteTarget(data)).map_err(|_| CodecError::TypeMismatch {
                strategy: self.marshal.name(),
                target: "a structured value (expected a byte sequence target)",
            });
        }

        let value = self.marshal.unmarshal(&data)?;
        serde_json::from_value(value).map_err(|e| CodecError::marshal(self.marshal.name(), e))
    }

    /// Decodes a frame into a byte-sequence target through
    /// [`Marshal::unmarshal_bytes`].
    pub fn decode_bytes(&self, frame: Frame) -> CodecResult<Vec<u8>> {
        let data = self.decrypt(frame.data)?;
        self.marshal.unmarshal_bytes(data)
    }

    fn decrypt(&self, data: Vec<u8>) -> CodecResult<Vec<u8>> {
        match &self.crypto {
            Some(crypto) => crypto.decrypt(data),
            None => Ok(data),
        }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::json()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    /// XORs every byte with 0xFF and appends a one-byte additive checksum.
    #[derive(Debug)]
    pub(crate) struct XorCrypto;

    impl Crypto for XorCrypto {
        fn encrypt(&self, data: Vec<u8>) -> CodecResult<Vec<u8>> {
            let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            let mut out: Vec<u8> = data.into_iter().map(|b| b ^ 0xFF).collect();
            out.push(sum);
            Ok(out)
        }

        fn decrypt(&self, mut data: Vec<u8>) -> CodecResult<Vec<u8>> {
            let sum = data
                .pop()
                .ok_or_else(|| CodecError::Decrypt("empty payload".into()))?;
            let plain: Vec<u8> = data.into_iter().map(|b| b ^ 0xFF).collect();
            let actual = plain.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            if actual != sum {
                return Err(CodecError::Decrypt("checksum mismatch".into()));
            }
            Ok(plain)
        }
    }

    /// Refuses both directions.
    #[derive(Debug)]
    pub(crate) struct RefusingCrypto;

    impl Crypto for RefusingCrypto {
        fn encrypt(&self, _data: Vec<u8>) -> CodecResult<Vec<u8>> {
            Err(CodecError::Encrypt("refused".into()))
        }

        fn decrypt(&self, _data: Vec<u8>) -> CodecResult<Vec<u8>> {
            Err(CodecError::Decrypt("refused".into()))
        }
    }

    /// Marshal that records whether it was ever asked to unmarshal.
    #[derive(Debug, Default)]
    struct CountingMarshal(std::sync::atomic::AtomicUsize);

    impl Marshal for CountingMarshal {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn marshal(&self, value: &Value) -> CodecResult<Vec<u8>> {
            JsonMarshal.marshal(value)
        }

        fn unmarshal(&self, data: &[u8]) -> CodecResult<Value> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            JsonMarshal.unmarshal(data)
        }
    }

    #[test]
    fn test_bytes_and_text_bypass_marshal() {
        let codec = WireCodec::json();

        let frame = codec.encode(&Outgoing::from(&b"\x00\xffraw"[..])).unwrap();
        assert_eq!(frame, Frame::text(b"\x00\xffraw".to_vec()));

        let frame = codec.encode(&Outgoing::from("héllo")).unwrap();
        assert_eq!(frame, Frame::text("héllo"));
    }

    #[test]
    fn test_structured_values_are_binary() {
        let frame = WireCodec::json()
            .encode(&Outgoing::from(json!("hi")))
            .unwrap();
        assert_eq!(frame.kind, FrameKind::Binary);
        assert_eq!(frame.data, br#""hi""#);
    }

    #[test]
    fn test_raw_codec_is_identity_for_bytes() {
        let codec = WireCodec::raw();
        let all_bytes: Vec<u8> = (0..=255).collect();
        let frame = codec.encode(&Outgoing::from(all_bytes.clone())).unwrap();
        assert_eq!(codec.decode_bytes(frame).unwrap(), all_bytes);
    }

    #[test]
    fn test_raw_codec_rejects_structured_target() {
        let codec = WireCodec::raw();
        let err = codec.decode::<Value>(Frame::text("{}")).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn test_raw_codec_binds_byte_targets() {
        let codec = WireCodec::raw().with_crypto(XorCrypto);
        let frame = codec.encode(&Outgoing::from(&b"\x00hi"[..])).unwrap();
        assert_eq!(codec.decode::<Vec<u8>>(frame).unwrap(), b"\x00hi");

        let err = codec
            .decode::<String>(codec.encode(&Outgoing::from("hi")).unwrap())
            .unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { strategy: "raw", .. }));
    }

    #[test]
    fn test_json_byte_targets() {
        let codec = WireCodec::json();
        assert_eq!(
            codec.decode::<Vec<u8>>(Frame::text("[104,105]")).unwrap(),
            b"hi"
        );
        assert_eq!(
            codec.decode_bytes(Frame::text(r#"{"a":1}"#)).unwrap(),
            br#"{"a":1}"#
        );
    }

    #[test]
    fn test_crypto_round_trip_structured() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Greeting {
            to: String,
            times: u32,
        }

        let codec = WireCodec::json().with_crypto(XorCrypto);
        let original = Greeting {
            to: "world".into(),
            times: 3,
        };
        let frame = codec
            .encode(&Outgoing::structured(&original).unwrap())
            .unwrap();
        assert_ne!(frame.data, serde_json::to_vec(&original).unwrap());
        assert_eq!(codec.decode::<Greeting>(frame).unwrap(), original);
    }

    #[test]
    fn test_crypto_applies_to_text_branch() {
        let codec = WireCodec::json().with_crypto(XorCrypto);
        let frame = codec.encode(&Outgoing::from("hi")).unwrap();
        assert_eq!(frame.kind, FrameKind::Text);
        assert_eq!(frame.data[..2], [b'h' ^ 0xFF, b'i' ^ 0xFF]);

        let codec = WireCodec::raw().with_crypto(XorCrypto);
        let frame = codec.encode(&Outgoing::from("hi")).unwrap();
        assert_eq!(codec.decode_bytes(frame).unwrap(), b"hi");
    }

    #[test]
    fn test_xor_round_trip_and_corruption() {
        let codec = WireCodec::json().with_crypto(XorCrypto);
        let frame = codec.encode(&Outgoing::from(json!("hi"))).unwrap();
        assert_eq!(codec.decode::<String>(frame.clone()).unwrap(), "hi");

        let mut corrupted = frame;
        corrupted.data[1] ^= 0x01;
        assert!(matches!(
            codec.decode::<String>(corrupted),
            Err(CodecError::Decrypt(_))
        ));
    }

    #[test]
    fn test_chacha_round_trip() {
        let codec = WireCodec::json().with_crypto(ChaChaCrypto::new(&[9u8; 32]));
        assert!(codec.is_encrypted());
        let frame = codec.encode(&Outgoing::from(json!({"n": 1}))).unwrap();
        assert_eq!(codec.decode::<Value>(frame).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn test_encrypt_failure_aborts_encoding() {
        let codec = WireCodec::json().with_crypto(RefusingCrypto);
        assert!(matches!(
            codec.encode(&Outgoing::from("hi")),
            Err(CodecError::Encrypt(_))
        ));
    }

    #[test]
    fn test_decrypt_failure_skips_unmarshal() {
        let marshal = Arc::new(CountingMarshal::default());
        let codec = WireCodec {
            marshal: marshal.clone(),
            crypto: Some(Arc::new(RefusingCrypto)),
        };
        assert!(codec.decode::<Value>(Frame::text("{}")).is_err());
        assert_eq!(marshal.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_decode_type_mismatch_after_unmarshal() {
        let err = WireCodec::json()
            .decode::<u32>(Frame::text(r#""not a number""#))
            .unwrap_err();
        assert!(matches!(err, CodecError::Marshal { strategy: "json", .. }));
    }
}
