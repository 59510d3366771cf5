//! Values stored through a [`StorageHandler`](super::StorageHandler).

use serde::{Deserialize, Serialize};

/// A unit of data a storage handler can persist and return unchanged.
///
/// The variant tag is part of the stored form, so a value always comes back
/// as the same variant it was written as.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheValue;
///
/// let value = CacheValue::from("hello");
/// assert_eq!(value.as_text(), Some("hello"));
/// assert_eq!(value.as_int(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CacheValue {
    /// A signed integer, the only variant `increment`/`decrement` operate on.
    Int(i64),
    /// UTF-8 text. Serialized cache envelopes are stored as text.
    Text(String),
    /// Arbitrary bytes, base64-encoded at rest.
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl CacheValue {
    /// Returns the integer if this is an [`Int`](Self::Int).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text if this is a [`Text`](Self::Text).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`Bytes`](Self::Bytes).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<i64> for CacheValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<String> for CacheValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for CacheValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Serde adapter that stores bytes as a standard-alphabet base64 string.
pub(crate) mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<T, S>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}
