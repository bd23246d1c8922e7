use crate::kv::{KvEntry, KvError, KvStore, Qualifiers, display_key};
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::atomic::{AtomicU64, Ordering},
};

///
/// KvStats
///
/// Physical operation counters for a [`MemoryKv`].
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KvStats {
    pub puts: u64,
    pub deletes: u64,
}

///
/// MemoryKv
///
/// In-process ordered store. Every trait operation takes the lock once, so
/// each is atomic with respect to the others.
///

#[derive(Debug, Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<Vec<u8>, Qualifiers>>,
    puts: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physical keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Snapshot of every stored key, in order.
    #[must_use]
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.inner.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn stats(&self) -> KvStats {
        KvStats {
            puts: self.puts.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    pub fn reset_stats(&self) {
        self.puts.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
    }

    fn count_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    fn count_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }
}

fn remove_cell(map: &mut BTreeMap<Vec<u8>, Qualifiers>, key: &[u8], qualifier: &[u8]) {
    if let Some(qualifiers) = map.get_mut(key) {
        qualifiers.remove(qualifier);
        if qualifiers.is_empty() {
            map.remove(key);
        }
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Qualifiers>, KvError> {
        Ok(self.inner.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], qualifier: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.inner
            .write()
            .entry(key.to_vec())
            .or_default()
            .insert(qualifier.to_vec(), value.to_vec());
        self.count_put();

        Ok(())
    }

    fn delete(&self, key: &[u8], qualifier: Option<&[u8]>) -> Result<(), KvError> {
        let mut map = self.inner.write();
        match qualifier {
            Some(qualifier) => remove_cell(&mut map, key, qualifier),
            None => {
                map.remove(key);
            }
        }
        self.count_delete();

        Ok(())
    }

    fn scan(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<KvEntry>, KvError> {
        if start >= end {
            return Ok(Vec::new());
        }

        let map = self.inner.read();
        let entries = map
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .take(limit)
            .map(|(key, qualifiers)| KvEntry {
                key: key.clone(),
                qualifiers: qualifiers.clone(),
            })
            .collect();

        Ok(entries)
    }

    fn increment(&self, key: &[u8], qualifier: &[u8], delta: i64) -> Result<i64, KvError> {
        let mut map = self.inner.write();
        let qualifiers = map.entry(key.to_vec()).or_default();

        let current = match qualifiers.get(qualifier) {
            None => 0,
            Some(bytes) => {
                let raw: [u8; 8] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| KvError::CounterCorrupt {
                            key: display_key(key),
                            len: bytes.len(),
                        })?;
                i64::from_be_bytes(raw)
            }
        };

        let next = current.wrapping_add(delta);
        qualifiers.insert(qualifier.to_vec(), next.to_be_bytes().to_vec());
        self.count_put();

        Ok(next)
    }

    fn compare_and_put(
        &self,
        key: &[u8],
        qualifier: &[u8],
        expected: Option<&[u8]>,
        value: &[u8],
    ) -> Result<bool, KvError> {
        let mut map = self.inner.write();
        let current = map.get(key).and_then(|q| q.get(qualifier)).map(Vec::as_slice);
        if current != expected {
            return Ok(false);
        }

        map.entry(key.to_vec())
            .or_default()
            .insert(qualifier.to_vec(), value.to_vec());
        self.count_put();

        Ok(true)
    }

    fn compare_and_delete(
        &self,
        key: &[u8],
        qualifier: &[u8],
        expected: &[u8],
    ) -> Result<bool, KvError> {
        let mut map = self.inner.write();
        let current = map.get(key).and_then(|q| q.get(qualifier)).map(Vec::as_slice);
        if current != Some(expected) {
            return Ok(false);
        }

        remove_cell(&mut map, key, qualifier);
        self.count_delete();

        Ok(true)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvOp;

    #[test]
    fn scan_is_half_open_and_ordered() {
        let kv = MemoryKv::new();
        for key in [[0x03u8], [0x01], [0x02], [0x04]] {
            kv.put(&key, b"", b"v").expect("put");
        }

        let keys: Vec<_> = kv
            .scan(&[0x01], &[0x04], usize::MAX)
            .expect("scan")
            .into_iter()
            .map(|e| e.key)
            .collect();

        assert_eq!(keys, vec![vec![0x01], vec![0x02], vec![0x03]]);
    }

    #[test]
    fn scan_iter_pages_through_the_whole_range() {
        let kv = MemoryKv::new();
        for i in 0u8..25 {
            kv.put(&[0x10, i], b"", &[i]).expect("put");
        }

        let keys: Vec<_> = kv
            .scan_iter(&[0x10], &[0x11], 4)
            .map(|e| e.expect("page").key)
            .collect();

        assert_eq!(keys.len(), 25);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn scan_iter_tolerates_deletes_between_pages() {
        let kv = MemoryKv::new();
        for i in 0u8..10 {
            kv.put(&[i], b"", b"v").expect("put");
        }

        let mut seen = 0;
        for entry in kv.scan_iter(&[0x00], &[0xFF], 3) {
            let entry = entry.expect("entry");
            kv.delete(&entry.key, None).expect("delete");
            seen += 1;
        }

        assert_eq!(seen, 10);
        assert!(kv.is_empty());
    }

    #[test]
    fn increment_starts_from_zero_and_accumulates() {
        let kv = MemoryKv::new();

        assert_eq!(kv.increment(b"c", b"q", 5).expect("increment"), 5);
        assert_eq!(kv.increment(b"c", b"q", 1).expect("increment"), 6);
        assert_eq!(kv.increment(b"c", b"q", -2).expect("increment"), 4);
    }

    #[test]
    fn increment_rejects_malformed_counter_cell() {
        let kv = MemoryKv::new();
        kv.put(b"c", b"q", b"abc").expect("put");

        let err = kv.increment(b"c", b"q", 1).expect_err("corrupt counter");
        assert!(matches!(err, KvError::CounterCorrupt { len: 3, .. }));
    }

    #[test]
    fn compare_and_put_only_succeeds_on_matching_state() {
        let kv = MemoryKv::new();

        assert!(kv.compare_and_put(b"k", b"q", None, b"1").expect("cas"));
        assert!(!kv.compare_and_put(b"k", b"q", None, b"2").expect("cas"));
        assert!(!kv.compare_and_put(b"k", b"q", Some(b"0"), b"2").expect("cas"));
        assert!(kv.compare_and_put(b"k", b"q", Some(b"1"), b"2").expect("cas"));

        assert_eq!(kv.get_cell(b"k", b"q").expect("get"), Some(b"2".to_vec()));
    }

    #[test]
    fn compare_and_delete_removes_empty_keys() {
        let kv = MemoryKv::new();
        kv.put(b"k", b"q", b"1").expect("put");

        assert!(!kv.compare_and_delete(b"k", b"q", b"9").expect("cad"));
        assert!(kv.compare_and_delete(b"k", b"q", b"1").expect("cad"));
        assert!(kv.get(b"k").expect("get").is_none());
    }

    #[test]
    fn apply_runs_operations_in_order_and_counts_them() {
        let kv = MemoryKv::new();
        kv.apply(&[
            KvOp::Put {
                key: b"a".to_vec(),
                qualifier: Vec::new(),
                value: b"1".to_vec(),
            },
            KvOp::Delete {
                key: b"a".to_vec(),
                qualifier: None,
            },
            KvOp::Put {
                key: b"b".to_vec(),
                qualifier: Vec::new(),
                value: b"2".to_vec(),
            },
        ])
        .expect("apply");

        assert_eq!(kv.keys(), vec![b"b".to_vec()]);
        assert_eq!(kv.stats(), KvStats { puts: 2, deletes: 1 });
    }
}
