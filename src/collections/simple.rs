/*!
 * Simple Hashtable
 * Pointer-sized integer keys mapped to values
 */

use super::hashtable::Hashtable;
use crate::core::hash::hash_int_ptr;

/// Stored pair; `value` is only `None` in lookup probes
#[derive(Debug, Clone)]
pub struct KeyValuePair<V> {
    pub key: usize,
    value: Option<V>,
}

fn pair_equal<V>(a: &KeyValuePair<V>, b: &KeyValuePair<V>) -> bool {
    a.key == b.key
}

fn pair_hash<V>(entry: &KeyValuePair<V>) -> u32 {
    hash_int_ptr(entry.key)
}

fn probe<V>(key: usize) -> KeyValuePair<V> {
    KeyValuePair { key, value: None }
}

/// Hashtable keyed by `usize` (handles, addresses, ids)
pub struct SimpleHashtable<V> {
    table: Hashtable<KeyValuePair<V>>,
}

impl<V> SimpleHashtable<V> {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            table: Hashtable::new(
                pair_equal::<V> as fn(&KeyValuePair<V>, &KeyValuePair<V>) -> bool,
                pair_hash::<V> as fn(&KeyValuePair<V>) -> u32,
                initial_capacity,
            ),
        }
    }

    /// Add a value; `None` if the key is already present
    pub fn add(&mut self, key: usize, value: V) -> Option<&mut V> {
        self.table
            .add(KeyValuePair {
                key,
                value: Some(value),
            })
            .and_then(|pair| pair.value.as_mut())
    }

    pub fn find(&self, key: usize) -> Option<&V> {
        self.table
            .find(&probe(key))
            .and_then(|pair| pair.value.as_ref())
    }

    pub fn find_mut(&mut self, key: usize) -> Option<&mut V> {
        self.table
            .find_mut(&probe(key))
            .and_then(|pair| pair.value.as_mut())
    }

    pub fn remove(&mut self, key: usize) -> Option<V> {
        self.table.take(&probe(key)).and_then(|pair| pair.value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &V)> {
        self.table
            .iter()
            .filter_map(|pair| pair.value.as_ref().map(|v| (pair.key, v)))
    }
}
