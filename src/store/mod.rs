//! Typed, per-domain metadata stores and their wire codecs.
//!
//! Every domain keeps its entries in a [`Metadata`] list: insertion ordered,
//! looked up by exact key equality. The domain modules define the key and
//! value types and how they are parsed from and serialized into the image.

pub mod exif;
pub mod iptc;
pub mod tiff;
pub mod xmp;

use std::fmt::Display;

use crate::rows::Entry;

/// A value that knows its type name and its string form.
pub trait MetaValue {
    fn type_name(&self) -> Option<&'static str>;
    fn to_bytes(&self) -> Vec<u8>;
}

/// One keyed entry of a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Datum<K, V> {
    pub key: K,
    pub value: V,
}

impl<K: Display, V: MetaValue> Entry for Datum<K, V> {
    fn key_string(&self) -> String {
        self.key.to_string()
    }

    fn value_bytes(&self) -> Vec<u8> {
        self.value.to_bytes()
    }

    fn type_name(&self) -> Option<&'static str> {
        self.value.type_name()
    }
}

/// An ordered list of entries, searchable by key.
///
/// The list itself does not enforce unique keys; each domain decides whether
/// it erases before inserting.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata<K, V> {
    entries: Vec<Datum<K, V>>,
}

impl<K, V> Default for Metadata<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: PartialEq, V> Metadata<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_key(&self, key: &K) -> Option<usize> {
        self.entries.iter().position(|d| &d.key == key)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_key(key).map(|i| &self.entries[i].value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self.find_key(key) {
            Some(i) => Some(&mut self.entries[i].value),
            None => None,
        }
    }

    /// Remove the first entry with `key`. Returns whether one was found.
    pub fn erase(&mut self, key: &K) -> bool {
        match self.find_key(key) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Remove every entry with `key`, returning how many were removed.
    pub fn erase_all(&mut self, key: &K) -> usize {
        let before = self.entries.len();
        self.entries.retain(|d| &d.key != key);
        before - self.entries.len()
    }

    /// Append an entry, even if the key already exists.
    pub fn add(&mut self, key: K, value: V) {
        self.entries.push(Datum { key, value });
    }

    /// Replace the value of the first entry with `key`, or append one.
    pub fn set(&mut self, key: K, value: V) {
        match self.find_key(&key) {
            Some(i) => self.entries[i].value = value,
            None => self.add(key, value),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datum<K, V>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Stable sort, keeping insertion order among equal elements.
    pub fn sort_by_key<T: Ord>(&mut self, f: impl FnMut(&Datum<K, V>) -> T) {
        self.entries.sort_by_key(f);
    }
}

impl<'a, K, V> IntoIterator for &'a Metadata<K, V> {
    type Item = &'a Datum<K, V>;
    type IntoIter = std::slice::Iter<'a, Datum<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Render numbers separated by single spaces.
pub(crate) fn join_numbers<T: Display>(items: &[T]) -> Vec<u8> {
    items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
        .into_bytes()
}

/// Parse whitespace-separated tokens with `parse`.
pub(crate) fn parse_tokens<T>(
    text: &[u8],
    mut parse: impl FnMut(&str) -> Option<T>,
) -> Option<Vec<T>> {
    let text = std::str::from_utf8(text).ok()?;
    let items: Option<Vec<T>> = text.split_whitespace().map(&mut parse).collect();
    items.filter(|v| !v.is_empty())
}
