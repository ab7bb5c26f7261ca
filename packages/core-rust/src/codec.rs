//! Payload codecs.
//!
//! A [`Codec`] turns a whole record into the opaque bytes stored in the
//! `data` column and back. Decoding never yields a partially-built record:
//! malformed input is a [`CodecError`].

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Failure while encoding or decoding a record payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("msgpack encode failed: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    #[error("msgpack decode failed: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
    #[error("json codec failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Converts records of type `T` to and from payload bytes.
pub trait Codec<T>: Send + Sync + 'static {
    /// Encode the full record.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the record cannot be represented.
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a payload previously produced by [`encode`](Codec::encode).
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] on malformed or mismatched input.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// `MsgPack` codec with named struct fields (`rmp_serde::to_vec_named`).
///
/// Named encoding keeps payloads readable across field reordering, at the
/// cost of a few bytes per field.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl<T> Codec<T> for MsgPackCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// JSON codec. Larger than [`MsgPackCodec`] but human-readable on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::record::RecordMeta;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        meta: RecordMeta,
        celsius: f64,
        tags: Vec<String>,
    }

    fn reading() -> Reading {
        Reading {
            meta: RecordMeta::with_id("r-1").with_type("temp").with_created_at(10),
            celsius: 21.5,
            tags: vec!["kitchen".to_string()],
        }
    }

    #[test]
    fn msgpack_preserves_header_and_body() {
        let codec = MsgPackCodec;
        let bytes = Codec::<Reading>::encode(&codec, &reading()).unwrap();
        let decoded: Reading = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, reading());
    }

    #[test]
    fn json_payload_is_readable() {
        let bytes = Codec::<Reading>::encode(&JsonCodec, &reading()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"celsius\":21.5"));
        assert!(text.contains("\"type\":\"temp\""));
    }

    #[test]
    fn msgpack_rejects_garbage() {
        let result: Result<Reading, _> = MsgPackCodec.decode(&[0xc1, 0x00, 0xff]);
        assert!(matches!(result, Err(CodecError::MsgPackDecode(_))));
    }

    #[test]
    fn json_rejects_truncated_payload() {
        let bytes = Codec::<Reading>::encode(&JsonCodec, &reading()).unwrap();
        let result: Result<Reading, _> = JsonCodec.decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(CodecError::Json(_))));
    }

    #[test]
    fn msgpack_rejects_payload_of_another_shape() {
        let other = rmp_serde::to_vec_named(&vec![1u8, 2, 3]).unwrap();
        let result: Result<Reading, _> = MsgPackCodec.decode(&other);
        assert!(result.is_err());
    }
}
