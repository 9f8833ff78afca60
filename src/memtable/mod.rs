pub mod btree;

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::error::Result;
use crate::types::{Key, Value};
use btree::BTree;

/// In-memory sorted buffer for writes. Wraps a `BTree` behind a `RwLock`.
///
/// Every committed write lands here after it is durable in the WAL. When
/// the engine flushes, the memtable is frozen (becomes immutable) and its
/// contents are written out as a persisted run.
pub struct MemTable {
    tree: RwLock<BTree>,
}

impl MemTable {
    /// Create a new empty memtable whose tree uses the given degree.
    pub fn new(degree: usize) -> Self {
        MemTable {
            tree: RwLock::new(BTree::new(degree)),
        }
    }

    /// Insert or update a key-value pair. Returns the previous value.
    pub fn put(&self, key: Key, value: Value) -> Result<Option<Value>> {
        self.tree.write().insert(key, value)
    }

    pub fn get(&self, key: Key) -> Option<Value> {
        self.tree.read().get(key).cloned()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.tree.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().is_empty()
    }

    /// Shared access to the underlying tree, e.g. to iterate it in order.
    /// Writers block while the guard is held.
    pub fn read(&self) -> RwLockReadGuard<'_, BTree> {
        self.tree.read()
    }
}

struct Tables {
    active: Arc<MemTable>,
    immutable: Option<Arc<MemTable>>,
}

/// Holds the active memtable and at most one frozen memtable awaiting flush.
///
/// Reads check active first, then immutable: the active table always holds
/// the newer value for a key.
pub struct MemTableManager {
    tables: RwLock<Tables>,
    degree: usize,
}

impl MemTableManager {
    pub fn new(degree: usize) -> Self {
        MemTableManager {
            tables: RwLock::new(Tables {
                active: Arc::new(MemTable::new(degree)),
                immutable: None,
            }),
            degree,
        }
    }

    /// Write into the active memtable.
    pub fn put(&self, key: Key, value: Value) -> Result<Option<Value>> {
        let active = Arc::clone(&self.tables.read().active);
        active.put(key, value)
    }

    pub fn get(&self, key: Key) -> Option<Value> {
        let (active, immutable) = self.snapshot();
        active
            .get(key)
            .or_else(|| immutable.and_then(|table| table.get(key)))
    }

    /// Current active and frozen tables, cheaply cloned.
    pub fn snapshot(&self) -> (Arc<MemTable>, Option<Arc<MemTable>>) {
        let tables = self.tables.read();
        (Arc::clone(&tables.active), tables.immutable.clone())
    }

    /// Move the active memtable to the immutable slot and start a new one.
    ///
    /// Returns the frozen table, or `None` if a frozen table is already
    /// waiting (it must be flushed first) or the active table is empty.
    pub fn freeze(&self) -> Option<Arc<MemTable>> {
        let mut tables = self.tables.write();
        if tables.immutable.is_some() || tables.active.is_empty() {
            return None;
        }
        let fresh = Arc::new(MemTable::new(self.degree));
        let frozen = std::mem::replace(&mut tables.active, fresh);
        tables.immutable = Some(Arc::clone(&frozen));
        Some(frozen)
    }

    pub fn immutable(&self) -> Option<Arc<MemTable>> {
        self.tables.read().immutable.clone()
    }

    pub fn has_immutable(&self) -> bool {
        self.tables.read().immutable.is_some()
    }

    /// Drop the frozen memtable once its run is readable.
    pub fn clear_immutable(&self) {
        self.tables.write().immutable = None;
    }

    /// Entries in the active memtable.
    pub fn active_len(&self) -> usize {
        self.tables.read().active.len()
    }

    /// Entries in the frozen memtable, 0 if there is none.
    pub fn immutable_len(&self) -> usize {
        self.tables
            .read()
            .immutable
            .as_ref()
            .map_or(0, |table| table.len())
    }
}
