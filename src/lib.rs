//! # LightDB
//!
//! An embedded key-value engine with integer keys and string values.
//!
//! ## Core idea
//! Writes go to an append-only log first and are fsynced before they are
//! applied to an in-memory B-tree (the memtable). The log is the source of
//! truth: on open, the memtable is rebuilt by replaying it. Flushing turns
//! the memtable into an immutable on-disk run made of fixed-size pages, and
//! lookups fall through memtable → newest run → oldest run.
//!
//! ```no_run
//! use lightdb::DB;
//!
//! let db = DB::open("/tmp/lightdb/data.wal", 32)?;
//! db.put(10, "ten")?;
//! assert_eq!(db.get(10)?.as_deref(), Some("ten"));
//! db.close()?;
//! # Ok::<(), lightdb::Error>(())
//! ```

pub mod db;
pub mod disk;
pub mod error;
pub mod memtable;
pub mod sstable;
pub mod types;
pub mod wal;

// Public re-exports for the top-level API
pub use db::{DB, Options, Stats};
pub use error::{Error, Result};
pub use types::{Key, Value};
