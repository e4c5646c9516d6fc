//! The key/value wire format spoken between mappers, the shuffle and
//! reducers.
//!
//! A record is one line: a UTF-8 key, a TAB, a value field, and a LF. Keys
//! must not contain TAB or LF; that is up to the producer and is not checked.
//!
//! Two value encodings exist:
//!
//! * [`Armored`]: the value is serialized to its canonical JSON form and then
//!   base64 encoded, so any serializable value survives the trip and the
//!   field never contains a delimiter.
//! * [`TsvInternal`]: the value is a list of plain strings written directly,
//!   separated by TABs. Nothing is escaped, so the strings must already be
//!   free of TAB and LF. When reading, a group whose key is not UTF-8 is
//!   skipped whole, and a record with a non-UTF-8 value field is dropped
//!   from its group; the reducer input counts both separately.

use std::marker::PhantomData;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::utils::string_from_bytes;
use crate::KeyValue;

/// Serializes `value` and armors it into a delimiter-free ASCII string.
pub fn encode<V: Serialize + ?Sized>(value: &V) -> Result<Bytes, Error> {
    let canonical = serde_json::to_vec(value).map_err(Error::Encode)?;
    Ok(Bytes::from(STANDARD.encode(canonical)))
}

/// Inverse of [`encode`].
pub fn decode<V: DeserializeOwned>(armored: &[u8]) -> Result<V, Error> {
    let canonical = STANDARD.decode(armored)?;
    serde_json::from_slice(&canonical).map_err(Error::Payload)
}

/// Writes items of type `T` as complete records.
pub trait RecordFormat<T: ?Sized> {
    /// Appends the record for `item`, including its trailing LF, to `buf`.
    fn encode_into(&self, item: &T, buf: &mut BytesMut) -> Result<(), Error>;
}

/// Reads records back into a key and a value of type `V`.
///
/// Returning `Ok(None)` drops the record; returning an error aborts the
/// reader.
pub trait RecordDecoder<V> {
    fn decode_key(&self, raw: Bytes) -> Result<Option<String>, Error>;

    /// Decodes everything after the first TAB, or `None` if the line had
    /// no TAB.
    fn decode_value(&self, raw: Option<Bytes>) -> Result<Option<V>, Error>;
}

/// `key TAB base64(json(value)) LF`.
pub struct Armored<V = serde_json::Value> {
    _value: PhantomData<fn() -> V>,
}

impl<V> Armored<V> {
    pub fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<V> Default for Armored<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Armored<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V: Serialize> RecordFormat<KeyValue<V>> for Armored<V> {
    fn encode_into(&self, item: &KeyValue<V>, buf: &mut BytesMut) -> Result<(), Error> {
        let value = encode(&item.value)?;
        buf.reserve(item.key.len() + value.len() + 2);
        buf.put_slice(item.key.as_bytes());
        buf.put_u8(b'\t');
        buf.put(value);
        buf.put_u8(b'\n');
        Ok(())
    }
}

impl<V: DeserializeOwned> RecordDecoder<V> for Armored<V> {
    fn decode_key(&self, raw: Bytes) -> Result<Option<String>, Error> {
        Ok(Some(string_from_bytes(raw)?))
    }

    fn decode_value(&self, raw: Option<Bytes>) -> Result<Option<V>, Error> {
        let raw = raw.unwrap_or_default();
        decode(&raw).map(Some)
    }
}

/// `key TAB v1 TAB ... vn LF`, with no armoring.
#[derive(Clone, Copy, Debug, Default)]
pub struct TsvInternal;

impl<S: AsRef<str>> RecordFormat<KeyValue<Vec<S>>> for TsvInternal {
    fn encode_into(&self, item: &KeyValue<Vec<S>>, buf: &mut BytesMut) -> Result<(), Error> {
        buf.put_slice(item.key.as_bytes());
        for v in &item.value {
            buf.put_u8(b'\t');
            buf.put_slice(v.as_ref().as_bytes());
        }
        buf.put_u8(b'\n');
        Ok(())
    }
}

impl RecordDecoder<Vec<String>> for TsvInternal {
    fn decode_key(&self, raw: Bytes) -> Result<Option<String>, Error> {
        Ok(string_from_bytes(raw).ok())
    }

    fn decode_value(&self, raw: Option<Bytes>) -> Result<Option<Vec<String>>, Error> {
        let Some(raw) = raw else {
            return Ok(Some(Vec::new()));
        };
        Ok(raw
            .split(|&b| b == b'\t')
            .map(|field| String::from_utf8(field.to_vec()).ok())
            .collect())
    }
}
