/*!
 * Hashtable
 *
 * Separate chaining over a dense entry array.
 *
 * Entries live in one contiguous array and bucket chains are threaded through
 * each entry's `next` index, so lookups never chase heap pointers. Removed
 * entries are marked with the empty hash and pushed onto a free chain that the
 * next insertion reuses. The table only grows (doubling, then rounding up to a
 * prime bucket count) when the array is exhausted and the free chain is empty;
 * the rehash uses the cached hash codes and never calls the hash function.
 *
 * Not internally synchronized. Wrap it in a lock to share between threads.
 */

use crate::core::hash::prime_at_least;
use tracing::debug;

/// Hash code marking an unused entry
const EMPTY_HASH: u32 = u32::MAX;
/// End of a bucket or free chain
const NIL: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct HashEntry<T> {
    hash: u32,
    next: u32,
    body: Option<T>,
}

/// Hashtable parameterized by caller-supplied equality and hash functions
///
/// Lookups take a *partial entry*: a value of `T` filled in just enough for
/// `equal` and `hash` to work on it.
///
/// # Example
///
/// ```
/// use refcore::collections::Hashtable;
///
/// let mut table = Hashtable::new(|a: &u32, b: &u32| a == b, |k: &u32| *k, 4);
/// assert!(table.add(7).is_some());
/// assert!(table.add(7).is_none());
/// assert_eq!(table.find(&7), Some(&7));
/// ```
pub struct Hashtable<T, E = fn(&T, &T) -> bool, H = fn(&T) -> u32> {
    buckets: Vec<u32>,
    entries: Vec<HashEntry<T>>,
    allocated_entries: usize,
    free_entry: u32,
    count: usize,
    equal: E,
    hash: H,
}

impl<T, E, H> Hashtable<T, E, H>
where
    E: Fn(&T, &T) -> bool,
    H: Fn(&T) -> u32,
{
    /// Create a table with room for at least `initial_capacity` entries
    pub fn new(equal: E, hash: H, initial_capacity: usize) -> Self {
        // Initial capacity of 0 is not allowed
        let capacity = initial_capacity.clamp(1, u32::MAX as usize / 2) as u32;
        let bucket_count = prime_at_least(capacity) as usize;

        Self {
            buckets: vec![NIL; bucket_count],
            entries: Vec::with_capacity(bucket_count),
            allocated_entries: bucket_count,
            free_entry: NIL,
            count: 0,
            equal,
            hash,
        }
    }

    /// Number of live entries
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Entries the table holds before it must resize
    #[inline]
    pub fn capacity(&self) -> usize {
        self.allocated_entries
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The empty-hash sentinel is never stored for a live entry
    #[inline]
    fn validated_hash(&self, entry: &T) -> u32 {
        match (self.hash)(entry) {
            EMPTY_HASH => 0,
            hash => hash,
        }
    }

    #[inline]
    fn bucket_index(&self, hash: u32) -> usize {
        (hash as usize) % self.buckets.len()
    }

    /// Walk one bucket chain looking for an entry equal to `entry`
    fn find_slot(&self, bucket: usize, hash: u32, entry: &T) -> Option<usize> {
        let mut i = self.buckets[bucket];
        while i != NIL {
            let candidate = &self.entries[i as usize];
            if candidate.hash == hash {
                if let Some(body) = &candidate.body {
                    if (self.equal)(body, entry) {
                        return Some(i as usize);
                    }
                }
            }
            i = candidate.next;
        }
        None
    }

    fn resize(&mut self, new_capacity: usize) {
        let bucket_count =
            prime_at_least(new_capacity.min(u32::MAX as usize - 1) as u32) as usize;

        debug!(
            old_buckets = self.buckets.len(),
            new_buckets = bucket_count,
            live = self.count,
            "hashtable resize"
        );

        self.buckets.clear();
        self.buckets.resize(bucket_count, NIL);

        self.allocated_entries = bucket_count;
        self.entries
            .reserve_exact(bucket_count.saturating_sub(self.entries.len()));

        // Re-distribute live entries using their cached hash codes
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if entry.hash != EMPTY_HASH {
                let index = (entry.hash as usize) % bucket_count;
                entry.next = self.buckets[index];
                self.buckets[index] = i as u32;
            }
        }
    }

    /// Insert without consulting existing entries
    fn insert_new(&mut self, hash: u32, entry: T) -> &mut T {
        let slot = if self.free_entry != NIL {
            let slot = self.free_entry;
            self.free_entry = self.entries[slot as usize].next;
            slot as usize
        } else {
            if self.entries.len() == self.allocated_entries {
                self.resize(self.buckets.len() * 2);
            }
            self.entries.push(HashEntry {
                hash: EMPTY_HASH,
                next: NIL,
                body: None,
            });
            self.entries.len() - 1
        };

        // Link as the new head of its bucket chain
        let bucket = self.bucket_index(hash);
        let head = self.buckets[bucket];
        self.buckets[bucket] = slot as u32;
        self.count += 1;

        let stored = &mut self.entries[slot];
        stored.hash = hash;
        stored.next = head;
        stored.body.insert(entry)
    }

    /// Add an entry unless an equal one exists
    ///
    /// Returns the stored entry, or `None` if an equal entry was already
    /// present (the new entry is dropped). The reference is valid until the
    /// next mutation of the table.
    pub fn add(&mut self, entry: T) -> Option<&mut T> {
        match self.add_or_get(entry) {
            (stored, true) => Some(stored),
            (_, false) => None,
        }
    }

    /// Add an entry or return the existing equal one
    ///
    /// The flag is `true` when the entry was newly added.
    pub fn add_or_get(&mut self, entry: T) -> (&mut T, bool) {
        let hash = self.validated_hash(&entry);
        let bucket = self.bucket_index(hash);

        match self.find_slot(bucket, hash, &entry) {
            // A live entry always has a body, so `entry` is discarded here
            Some(existing) => (self.entries[existing].body.get_or_insert(entry), false),
            None => (self.insert_new(hash, entry), true),
        }
    }

    /// Add an entry even if an equal one exists
    pub fn add_duplicate(&mut self, entry: T) -> &mut T {
        let hash = self.validated_hash(&entry);
        self.insert_new(hash, entry)
    }

    /// Locate the entry equal to a partial entry
    pub fn find(&self, entry: &T) -> Option<&T> {
        let hash = self.validated_hash(entry);
        let bucket = self.bucket_index(hash);
        self.find_slot(bucket, hash, entry)
            .and_then(|i| self.entries[i].body.as_ref())
    }

    pub fn find_mut(&mut self, entry: &T) -> Option<&mut T> {
        let hash = self.validated_hash(entry);
        let bucket = self.bucket_index(hash);
        self.find_slot(bucket, hash, entry)
            .and_then(move |i| self.entries[i].body.as_mut())
    }

    #[inline]
    pub fn contains(&self, entry: &T) -> bool {
        self.find(entry).is_some()
    }

    /// Remove the entry equal to a partial entry
    pub fn remove(&mut self, entry: &T) -> bool {
        self.take(entry).is_some()
    }

    /// Remove the entry equal to a partial entry and return it
    pub fn take(&mut self, entry: &T) -> Option<T> {
        let hash = self.validated_hash(entry);
        let bucket = self.bucket_index(hash);
        let mut previous = NIL;
        let mut i = self.buckets[bucket];

        while i != NIL {
            let candidate = &self.entries[i as usize];
            let next = candidate.next;
            let matched = candidate.hash == hash
                && candidate
                    .body
                    .as_ref()
                    .is_some_and(|body| (self.equal)(body, entry));

            if matched {
                // Unlink from the bucket chain
                if previous == NIL {
                    self.buckets[bucket] = next;
                } else {
                    self.entries[previous as usize].next = next;
                }

                let removed = &mut self.entries[i as usize];
                removed.hash = EMPTY_HASH;
                removed.next = self.free_entry;
                self.free_entry = i;
                self.count -= 1;

                return removed.body.take();
            }

            previous = i;
            i = next;
        }

        None
    }

    /// Remove every entry, keeping the allocated storage
    pub fn clear(&mut self) {
        self.buckets.fill(NIL);
        self.entries.clear();
        self.free_entry = NIL;
        self.count = 0;
    }

    /// Resumable enumeration
    ///
    /// Start with `cursor = 0`; each call yields the next live entry. Do not
    /// mutate the table between calls. Reset the cursor to 0 to restart.
    pub fn enumerate(&self, cursor: &mut usize) -> Option<&T> {
        while *cursor < self.entries.len() {
            let entry = &self.entries[*cursor];
            *cursor += 1;
            if entry.hash != EMPTY_HASH {
                if let Some(body) = &entry.body {
                    return Some(body);
                }
            }
        }
        None
    }

    /// Iterate live entries in storage order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().filter_map(|e| e.body.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.entries.iter_mut().filter_map(|e| e.body.as_mut())
    }
}

impl<T: std::fmt::Debug, E, H> std::fmt::Debug for Hashtable<T, E, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hashtable")
            .field("count", &self.count)
            .field("buckets", &self.buckets.len())
            .field("capacity", &self.allocated_entries)
            .finish()
    }
}
