//! The interned string store: an append-only deduplicated string pool
//! addressed by a stable `StringLocator`. Behaves "as if" an idealized
//! `content -> locator` hash map, but concretely reuses the hash value
//! itself as the locator and resolves collisions by linear probing over
//! the 64-bit id space, tracking a `max_probe_distance` statistic so
//! lookups never have to scan further than insertion ever pushed them.
//! The hash function (`rustc_hash::FxHasher`) is not pinned by anything
//! other than determinism of `intern`/`get` within one store instance.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::{CoreError, CoreResult};
use crate::strings::compact::{CompactString, SHORT_MAX_LEN};

/// A stable handle to an interned string. `StringLocator::NONE` is
/// reserved and is never returned by `intern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringLocator(pub u64);

impl StringLocator {
    pub const NONE: StringLocator = StringLocator(u64::MAX);
}

struct Entry {
    compact: CompactString,
    len: usize,
}

/// Append-only, deduplicated string pool.
pub struct StringStore {
    hash_seed: u64,
    map: HashMap<u64, Entry>,
    max_probe_distance: usize,
    long_pool: Vec<u8>,
}

impl StringStore {
    pub fn new() -> Self {
        Self::with_seed(123)
    }

    pub fn with_seed(hash_seed: u64) -> Self {
        Self {
            hash_seed,
            map: HashMap::new(),
            max_probe_distance: 0,
            long_pool: Vec::new(),
        }
    }

    /// Number of distinct interned strings.
    pub fn size(&self) -> usize {
        self.map.len()
    }

    /// Largest probe distance any lookup has ever needed; purely an
    /// observability statistic.
    pub fn max_probe_distance(&self) -> usize {
        self.max_probe_distance
    }

    /// Intern `bytes`, returning the existing locator if already
    /// present, otherwise appending and returning a fresh one.
    pub fn intern(&mut self, bytes: &[u8]) -> CoreResult<StringLocator> {
        if let Some(id) = self.priv_find(bytes) {
            return Ok(StringLocator(id));
        }

        let id = self.priv_generate_id(bytes);
        let compact = if bytes.len() <= SHORT_MAX_LEN {
            CompactString::new_short(bytes)
        } else {
            let offset = self.priv_push_long(bytes)?;
            CompactString::new_long(offset)
        };
        self.map.insert(
            id,
            Entry {
                compact,
                len: bytes.len(),
            },
        );
        Ok(StringLocator(id))
    }

    /// An immutable view of the bytes behind `locator`. Undefined if the
    /// locator did not originate from this store (we return `None`
    /// rather than invoke true UB, since nothing in safe Rust can index
    /// out of bounds silently).
    pub fn get(&self, locator: StringLocator) -> Option<&[u8]> {
        let entry = self.map.get(&locator.0)?;
        Some(match &entry.compact {
            CompactString::Short { .. } => entry.compact.short_bytes().unwrap(),
            CompactString::Long { arena_offset } => {
                let start = *arena_offset as usize;
                &self.long_pool[start..start + entry.len]
            }
        })
    }

    pub fn get_str(&self, locator: StringLocator) -> Option<&str> {
        self.get(locator)
            .map(|b| std::str::from_utf8(b).expect("interned strings are always valid utf8"))
    }

    fn priv_hash(&self, bytes: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        self.hash_seed.hash(&mut hasher);
        bytes.hash(&mut hasher);
        let h = hasher.finish();
        if h == StringLocator::NONE.0 {
            Self::priv_increment(h)
        } else {
            h
        }
    }

    fn priv_increment(id: u64) -> u64 {
        let next = id.wrapping_add(1);
        if next == StringLocator::NONE.0 {
            0
        } else {
            next
        }
    }

    fn priv_find(&self, bytes: &[u8]) -> Option<u64> {
        let mut id = self.priv_hash(bytes);
        for _ in 0..=self.max_probe_distance {
            match self.map.get(&id) {
                None => return None,
                Some(entry) => {
                    let matches = match entry.compact {
                        CompactString::Short { .. } => entry.compact.short_bytes() == Some(bytes),
                        CompactString::Long { arena_offset } => {
                            let start = arena_offset as usize;
                            &self.long_pool[start..start + entry.len] == bytes
                        }
                    };
                    if matches {
                        return Some(id);
                    }
                    id = Self::priv_increment(id);
                }
            }
        }
        None
    }

    fn priv_generate_id(&mut self, bytes: &[u8]) -> u64 {
        let mut id = self.priv_hash(bytes);
        let mut distance = 0usize;
        while self.map.contains_key(&id) {
            id = Self::priv_increment(id);
            distance += 1;
        }
        self.max_probe_distance = self.max_probe_distance.max(distance);
        id
    }

    fn priv_push_long(&mut self, bytes: &[u8]) -> CoreResult<u32> {
        if self.long_pool.len() + bytes.len() > u32::MAX as usize {
            return Err(CoreError::Capacity(
                "string arena exceeded u32 addressable range".into(),
            ));
        }
        let offset = self.long_pool.len() as u32;
        self.long_pool.extend_from_slice(bytes);
        Ok(offset)
    }
}

impl Default for StringStore {
    fn default() -> Self {
        Self::new()
    }
}
