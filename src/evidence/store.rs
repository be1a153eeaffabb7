//! Keyed stores for pair-keyed aggregation
//!
//! The accumulator only relies on [`KeyedStore`]: point get/put and a full
//! scan in first-insertion order. [`MemoryStore`] serves small runs;
//! [`RocksStore`] keeps entries in a throwaway RocksDB so memory stays flat
//! however many distinct keys a query produces.

use indexmap::IndexMap;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;
use std::marker::PhantomData;
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

const KEYS_CF: &str = "keys";
const ENTRIES_CF: &str = "entries";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Column family error: {0}")]
    ColumnFamily(String),

    #[error("Corrupt entry: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait KeyedStore<K, V>: Send {
    fn get(&self, key: &K) -> StoreResult<Option<V>>;

    /// Insert or replace. A replaced key keeps its original position.
    fn put(&mut self, key: K, value: V) -> StoreResult<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry, in the order keys were first inserted
    fn entries(&self) -> Box<dyn Iterator<Item = StoreResult<(K, V)>> + '_>;
}

/// In-memory store
#[derive(Debug, Clone)]
pub struct MemoryStore<K, V> {
    entries: IndexMap<K, V>,
}

impl<K, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyedStore<K, V> for MemoryStore<K, V>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> StoreResult<Option<V>> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: K, value: V) -> StoreResult<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> Box<dyn Iterator<Item = StoreResult<(K, V)>> + '_> {
        Box::new(self.entries.iter().map(|(k, v)| Ok((k.clone(), v.clone()))))
    }
}

/// RocksDB store in a temporary directory, removed on drop.
///
/// `keys` maps an encoded key to its insertion sequence number; `entries`
/// maps the big-endian sequence number to the encoded `(key, value)` pair, so
/// a forward scan of `entries` is insertion order.
pub struct RocksStore<K, V> {
    // Declared before `dir`: the database must close before its directory goes
    db: DB,
    dir: TempDir,
    next_seq: u64,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> RocksStore<K, V> {
    pub fn open_temporary() -> StoreResult<Self> {
        let dir = tempfile::Builder::new().prefix("golr-aggregate").tempdir()?;
        debug!("Opening aggregation store at: {}", dir.path().display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(KEYS_CF, Options::default()),
            ColumnFamilyDescriptor::new(ENTRIES_CF, Self::entries_options()),
        ];
        let db = DB::open_cf_descriptors(&opts, dir.path(), cf_descriptors)?;

        Ok(Self {
            db,
            dir,
            next_seq: 0,
            _marker: PhantomData,
        })
    }

    fn entries_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    fn cf(&self, name: &str) -> StoreResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::ColumnFamily(name.to_string()))
    }
}

fn decode_seq(bytes: &[u8]) -> StoreResult<u64> {
    let array: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("sequence number of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(array))
}

impl<K, V> KeyedStore<K, V> for RocksStore<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn get(&self, key: &K) -> StoreResult<Option<V>> {
        let encoded = bincode::serialize(key)?;
        let Some(seq) = self.db.get_cf(self.cf(KEYS_CF)?, &encoded)? else {
            return Ok(None);
        };
        let Some(entry) = self.db.get_cf(self.cf(ENTRIES_CF)?, &seq)? else {
            return Err(StoreError::Corrupt("key without entry".to_string()));
        };
        let (_, value): (K, V) = bincode::deserialize(&entry)?;
        Ok(Some(value))
    }

    fn put(&mut self, key: K, value: V) -> StoreResult<()> {
        let encoded_key = bincode::serialize(&key)?;
        let keys = self.cf(KEYS_CF)?;
        let seq = match self.db.get_cf(keys, &encoded_key)? {
            Some(existing) => decode_seq(&existing)?,
            None => {
                let seq = self.next_seq;
                self.db.put_cf(keys, &encoded_key, seq.to_be_bytes())?;
                seq
            }
        };
        let entry = bincode::serialize(&(key, value))?;
        self.db.put_cf(self.cf(ENTRIES_CF)?, seq.to_be_bytes(), entry)?;
        if seq == self.next_seq {
            self.next_seq += 1;
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.next_seq as usize
    }

    fn entries(&self) -> Box<dyn Iterator<Item = StoreResult<(K, V)>> + '_> {
        let cf = match self.cf(ENTRIES_CF) {
            Ok(cf) => cf,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };
        Box::new(self.db.iterator_cf(cf, IteratorMode::Start).map(|item| {
            let (_seq, entry) = item?;
            Ok(bincode::deserialize(&entry)?)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn KeyedStore<(String, String), u32>) {
        let key = |s: &str, o: &str| (s.to_string(), o.to_string());
        store.put(key("z", "1"), 1).unwrap();
        store.put(key("a", "2"), 2).unwrap();
        store.put(key("m", "3"), 3).unwrap();
        store.put(key("z", "1"), 10).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&key("z", "1")).unwrap(), Some(10));
        assert_eq!(store.get(&key("q", "0")).unwrap(), None);

        let entries: Vec<_> = store.entries().collect::<StoreResult<_>>().unwrap();
        assert_eq!(
            entries,
            vec![(key("z", "1"), 10), (key("a", "2"), 2), (key("m", "3"), 3)]
        );
    }

    #[test]
    fn test_memory_store_keeps_discovery_order() {
        let mut store: MemoryStore<(String, String), u32> = MemoryStore::new();
        exercise(&mut store);
    }

    #[test]
    fn test_rocks_store_keeps_discovery_order() {
        let mut store: RocksStore<(String, String), u32> = RocksStore::open_temporary().unwrap();
        exercise(&mut store);
    }

    #[test]
    fn test_rocks_store_directory_is_removed_on_drop() {
        let store: RocksStore<String, u32> = RocksStore::open_temporary().unwrap();
        let path = store.path().to_path_buf();
        assert!(path.exists());
        drop(store);
        assert!(!path.exists());
    }
}
