//! Key-value store boundary.
//!
//! The engine needs nothing beyond single-key atomic operations and ordered
//! range scans. Keys and values are raw bytes compared unsigned
//! lexicographically; each key holds a small map of named qualifiers.

mod memory;

pub use memory::{KvStats, MemoryKv};

use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Qualifier name to cell value for one physical key.
pub type Qualifiers = BTreeMap<Vec<u8>, Vec<u8>>;

///
/// KvError
///

#[derive(Debug, ThisError)]
pub enum KvError {
    #[error("kv i/o failure: {message}")]
    Io { message: String },

    #[error("counter cell under key {key} holds {len} bytes, expected 8")]
    CounterCorrupt { key: String, len: usize },
}

///
/// KvEntry
///
/// One physical key returned by a scan, with every qualifier it holds.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    pub qualifiers: Qualifiers,
}

impl KvEntry {
    /// Return the value stored under `qualifier`, if any.
    #[must_use]
    pub fn value(&self, qualifier: &[u8]) -> Option<&[u8]> {
        self.qualifiers.get(qualifier).map(Vec::as_slice)
    }
}

///
/// KvOp
///
/// One planned write. Mutation planning produces these without I/O.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum KvOp {
    Put {
        key: Vec<u8>,
        qualifier: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        key: Vec<u8>,
        qualifier: Option<Vec<u8>>,
    },
}

impl KvOp {
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key, .. } => key,
        }
    }

    #[must_use]
    pub const fn is_put(&self) -> bool {
        matches!(self, Self::Put { .. })
    }
}

///
/// KvStore
///
/// Required operations of the backing ordered store. Only single-key
/// atomicity is assumed; `apply` gives no cross-key guarantee.
///

pub trait KvStore: Send + Sync {
    /// Read every qualifier stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Qualifiers>, KvError>;

    fn put(&self, key: &[u8], qualifier: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Delete one qualifier, or the whole key when `qualifier` is `None`.
    fn delete(&self, key: &[u8], qualifier: Option<&[u8]>) -> Result<(), KvError>;

    /// Return at most `limit` entries with `start <= key < end`, in key order.
    fn scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<KvEntry>, KvError>;

    /// Atomically add `delta` to an 8-byte big-endian counter cell and return
    /// the new value. An absent cell counts as zero.
    fn increment(&self, key: &[u8], qualifier: &[u8], delta: i64) -> Result<i64, KvError>;

    /// Put `value` only if the current cell equals `expected` (`None` = absent).
    fn compare_and_put(
        &self,
        key: &[u8],
        qualifier: &[u8],
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, KvError>;

    /// Delete the cell only if it currently equals `expected`.
    fn compare_and_delete(
        &self,
        key: &[u8],
        qualifier: &[u8],
        expected: &[u8],
    ) -> Result<bool, KvError>;

    /// Apply a batch of operations in order.
    fn apply(&self, ops: &[KvOp]) -> Result<(), KvError> {
        for op in ops {
            match op {
                KvOp::Put {
                    key,
                    qualifier,
                    value,
                } => self.put(key, qualifier, value)?,
                KvOp::Delete { key, qualifier } => self.delete(key, qualifier.as_deref())?,
            }
        }

        Ok(())
    }

    /// Read a single cell.
    fn get_cell(&self, key: &[u8], qualifier: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self
            .get(key)?
            .and_then(|mut qualifiers| qualifiers.remove(qualifier)))
    }

    /// Stream `[start, end)` in batches of `batch_size` entries.
    fn scan_iter<'a>(&'a self, start: &[u8], end: &[u8], batch_size: usize) -> KvScan<'a>
    where
        Self: Sized,
    {
        KvScan::new(self, start.to_vec(), end.to_vec(), batch_size)
    }
}

///
/// KvScan
///
/// Paging iterator over a key range. Each page is a fresh bounded `scan`
/// call resuming just after the last key returned, so no store lock is held
/// between pages and callers may mutate the range while iterating.
///

pub struct KvScan<'a> {
    kv: &'a dyn KvStore,
    next_start: Vec<u8>,
    end: Vec<u8>,
    batch_size: usize,
    page: std::vec::IntoIter<KvEntry>,
    exhausted: bool,
}

impl<'a> KvScan<'a> {
    pub fn new(kv: &'a dyn KvStore, start: Vec<u8>, end: Vec<u8>, batch_size: usize) -> Self {
        Self {
            kv,
            next_start: start,
            end,
            batch_size: batch_size.max(1),
            page: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    fn fetch_page(&mut self) -> Result<(), KvError> {
        let page = self.kv.scan(&self.next_start, &self.end, self.batch_size)?;
        if page.len() < self.batch_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            // Smallest key strictly greater than `last.key`.
            let mut resume = last.key.clone();
            resume.push(0x00);
            self.next_start = resume;
        }
        self.page = page.into_iter();

        Ok(())
    }
}

impl Iterator for KvScan<'_> {
    type Item = Result<KvEntry, KvError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.page.next() {
                return Some(Ok(entry));
            }
            if self.exhausted {
                return None;
            }
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(err));
            }
        }
    }
}

/// Render a key for error messages.
#[must_use]
pub fn display_key(key: &[u8]) -> String {
    use std::fmt::Write;

    key.iter().fold(String::with_capacity(key.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}
