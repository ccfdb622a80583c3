//! Conversion between typed store entries and plain tag rows.
//!
//! A [`TagRow`] is the only shape the outside world sees: a key, a value and
//! a type name, all as bytes or text. Reading projects each store entry into
//! a row. Writing goes the other way: row text is transcoded into the
//! requested encoding and turned into a [`TagValue`]. A value is split into
//! pieces only when the row carries the `"array"` type hint.

pub mod array;
pub mod encoding;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use array::{ARRAY_SEPARATOR, join, split};

/// Type name reported when a store cannot name an entry's type.
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Write-side hint asking for a value to be split into several entries.
pub const ARRAY_HINT: &str = "array";

/// One metadata entry as exchanged with callers.
///
/// On read, `value` holds the store's string form of the entry, in whatever
/// byte encoding it was written with. On write, `key`, `value` and
/// `type_name` are UTF-8 text that gets transcoded before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub type_name: String,
}

impl TagRow {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, type_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            type_name: type_name.into(),
        }
    }

    /// A row for a single value, with no type hint.
    pub fn scalar(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(key, value, "")
    }

    /// A row whose pieces are joined with [`ARRAY_SEPARATOR`] and tagged as an array.
    pub fn array<P: AsRef<str>>(key: impl Into<Vec<u8>>, pieces: &[P]) -> Self {
        let pieces: Vec<&[u8]> = pieces.iter().map(|p| p.as_ref().as_bytes()).collect();
        Self::new(key, join(&pieces, ARRAY_SEPARATOR), ARRAY_HINT)
    }

    pub fn key_str(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    /// Decode the value with the encoding it was written in.
    pub fn decode_value(&self, encoding: &str) -> Result<String> {
        encoding::decode(&self.value, encoding)
    }

    pub fn is_array(&self) -> bool {
        self.type_name == ARRAY_HINT
    }
}

/// A value on its way into a store, after transcoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue {
    Scalar(Vec<u8>),
    Array(Vec<Vec<u8>>),
}

impl TagValue {
    /// Build from the wire form: split on the separator only for array hints.
    pub fn from_wire(value: Vec<u8>, type_name: &[u8]) -> Self {
        if type_name == ARRAY_HINT.as_bytes() {
            Self::Array(split(&value, ARRAY_SEPARATOR))
        } else {
            Self::Scalar(value)
        }
    }
}

/// A row after transcoding, ready to be applied to a store.
#[derive(Debug, Clone)]
pub(crate) struct Edit {
    pub key: String,
    pub value: Vec<u8>,
    pub type_name: Vec<u8>,
}

impl Edit {
    pub fn is_delete(&self) -> bool {
        self.value.is_empty()
    }

    pub fn into_value(self) -> TagValue {
        TagValue::from_wire(self.value, &self.type_name)
    }
}

/// Transcode the key, value and type name of each row into `encoding`.
///
/// Keys must stay valid UTF-8 after transcoding; store keys are ASCII.
pub(crate) fn prepare(rows: &[TagRow], encoding_label: &str) -> Result<Vec<Edit>> {
    rows.iter()
        .map(|row| {
            let key = encoding::transcode(&row.key, encoding_label)?;
            let key = String::from_utf8(key).map_err(|_| {
                crate::Error::Encoding(format!("key '{}' is not ASCII", row.key_str()))
            })?;
            Ok(Edit {
                key,
                value: encoding::transcode(&row.value, encoding_label)?,
                type_name: encoding::transcode(row.type_name.as_bytes(), encoding_label)?,
            })
        })
        .collect()
}

/// A typed store entry that can be projected into a [`TagRow`].
pub trait Entry {
    fn key_string(&self) -> String;
    fn value_bytes(&self) -> Vec<u8>;
    fn type_name(&self) -> Option<&'static str>;
}

/// Project store entries into rows, keeping the store's iteration order.
pub fn to_rows<'a, E, I>(entries: I) -> Vec<TagRow>
where
    E: Entry + 'a,
    I: IntoIterator<Item = &'a E>,
{
    entries
        .into_iter()
        .map(|e| TagRow {
            key: e.key_string().into_bytes(),
            value: e.value_bytes(),
            type_name: e.type_name().unwrap_or(UNKNOWN_TYPE).to_string(),
        })
        .collect()
}
