use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::error::{Error, Result};
use crate::memtable::{MemTable, MemTableManager};
use crate::sstable::{SSTable, SSTableBuilder, MAX_VALUE_LEN};
use crate::types::{validate_value, Key, Value};
use crate::wal::{WalReader, WalRecord, WalWriter};

const RUN_SUFFIX: &str = ".sst";
const TMP_RUN_SUFFIX: &str = ".sst.tmp";

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// The write-ahead log. Runs are kept next to it, named
    /// `<log stem>-<id>.sst`.
    pub wal_path: PathBuf,
    /// Minimum degree of the memtable B-tree (clamped to at least 2).
    pub degree: usize,
    /// Flush once the active memtable holds this many keys. `None` leaves
    /// flushing to explicit `DB::flush` calls.
    pub memtable_max_entries: Option<usize>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            wal_path: std::env::temp_dir().join("lightdb.wal"),
            degree: 32,
            memtable_max_entries: Some(65_536),
        }
    }
}

impl Options {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            ..Self::default()
        }
    }

    pub fn degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn memtable_max_entries(mut self, max: Option<usize>) -> Self {
        self.memtable_max_entries = max;
        self
    }
}

/// Point-in-time engine counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Keys in the active memtable.
    pub memtable_entries: usize,
    /// Keys in the frozen memtable awaiting flush.
    pub immutable_entries: usize,
    /// Persisted runs.
    pub runs: usize,
    /// Entries across all runs (a key may appear in several).
    pub run_entries: u64,
    /// Current WAL length in bytes.
    pub wal_bytes: u64,
}

/// State owned by whoever is flushing.
struct FlushState {
    /// WAL offset covered by the frozen memtable, if one is pending.
    pending_wal_offset: Option<u64>,
    next_run_id: u64,
}

/// An embedded key-value engine: B-tree memtable in front of a WAL, with
/// flushed memtables kept as immutable runs.
///
/// Commit protocol: a `put` is appended to the WAL and fsynced, then applied
/// to the memtable, all while holding the WAL lock. Anything visible in a
/// memtable is therefore already durable, and memtable order is log order.
///
/// Reads check the active memtable, then the frozen one, then runs from
/// newest to oldest; the first hit wins.
pub struct DB {
    options: Options,
    dir: PathBuf,
    run_prefix: String,
    /// The commit lock. Held across append + apply.
    wal: Mutex<WalWriter>,
    memtables: MemTableManager,
    /// Oldest first.
    runs: RwLock<Vec<Arc<SSTable>>>,
    flush_state: Mutex<FlushState>,
}

impl DB {
    /// Open with default options, logging to `wal_path`.
    pub fn open(wal_path: impl Into<PathBuf>, degree: usize) -> Result<Self> {
        Self::open_with_options(Options::new(wal_path).degree(degree))
    }

    /// Open the engine, recovering everything committed before.
    ///
    /// 1. Load existing runs, removing temporary files from interrupted flushes
    /// 2. Replay WAL records not covered by any run into a fresh memtable
    /// 3. Cut off a torn final record, then reopen the WAL for appending
    pub fn open_with_options(options: Options) -> Result<Self> {
        let wal_path = options.wal_path.clone();
        let dir = match wal_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let run_prefix = run_prefix(&wal_path)?;

        let runs = load_runs(&dir, &run_prefix)?;
        let memtables = MemTableManager::new(options.degree);
        let replayed = replay_wal(&wal_path, &runs, &memtables)?;

        let wal = WalWriter::open(&wal_path)?;
        let next_run_id = runs.last().map_or(1, |run| run.meta().id + 1);
        info!(
            "opened {}: {} records replayed, {} runs",
            wal_path.display(),
            replayed,
            runs.len()
        );

        Ok(DB {
            options,
            dir,
            run_prefix,
            wal: Mutex::new(wal),
            memtables,
            runs: RwLock::new(runs.into_iter().map(Arc::new).collect()),
            flush_state: Mutex::new(FlushState {
                pending_wal_offset: None,
                next_run_id,
            }),
        })
    }

    /// Durably record `key = value`, then make it visible.
    ///
    /// Returns only after the WAL record is fsynced. If the WAL write fails
    /// the memtable is untouched and the error is returned as is.
    pub fn put(&self, key: Key, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        validate_value(&value)?;
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::InvalidArgument(format!(
                "value of {} bytes exceeds limit of {MAX_VALUE_LEN}",
                value.len()
            )));
        }

        let should_flush = {
            let mut wal = self.wal.lock();
            let record = WalRecord::new(key, value);
            wal.append(&record)?;
            self.memtables.put(record.key, record.value)?;
            self.options
                .memtable_max_entries
                .is_some_and(|max| self.memtables.active_len() >= max)
        };

        if should_flush {
            self.auto_flush();
        }
        Ok(())
    }

    /// Look up `key` across memtables and runs.
    pub fn get(&self, key: Key) -> Result<Option<Value>> {
        if let Some(value) = self.memtables.get(key) {
            return Ok(Some(value));
        }

        // Cloned so run I/O happens without holding the lock.
        let runs = self.runs.read().clone();
        for run in runs.iter().rev() {
            if let Some(value) = run.get(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Write the active memtable out as a new run.
    ///
    /// Puts are blocked only while the memtable is swapped out; the run is
    /// written without holding the commit lock. The frozen memtable stays
    /// readable until the run is published. If writing fails the frozen
    /// memtable is kept and the next flush retries it.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.flush_state.lock();
        self.flush_locked(&mut state)
    }

    fn auto_flush(&self) {
        // Someone else is already flushing.
        let Some(mut state) = self.flush_state.try_lock() else {
            return;
        };
        if let Err(e) = self.flush_locked(&mut state) {
            warn!("automatic flush failed, memtable kept: {e}");
        }
    }

    fn flush_locked(&self, state: &mut FlushState) -> Result<()> {
        // A frozen table left behind by a failed flush goes first.
        if let (Some(table), Some(offset)) = (self.memtables.immutable(), state.pending_wal_offset) {
            self.write_run(state, &table, offset)?;
        }

        let (frozen, wal_offset) = {
            let wal = self.wal.lock();
            let Some(table) = self.memtables.freeze() else {
                return Ok(());
            };
            (table, wal.offset())
        };
        state.pending_wal_offset = Some(wal_offset);
        self.write_run(state, &frozen, wal_offset)
    }

    /// Persist the frozen memtable as the next run and publish it.
    fn write_run(&self, state: &mut FlushState, frozen: &MemTable, wal_offset: u64) -> Result<()> {
        let id = state.next_run_id;
        let path = self.run_path(id);
        info!("flushing {} entries to run {id}", frozen.len());

        let meta = {
            let tree = frozen.read();
            let mut builder = SSTableBuilder::new(&path, id)?;
            for (key, value) in tree.iter() {
                builder.add(key, value)?;
            }
            builder.finish(wal_offset)?
        };
        let run = Arc::new(SSTable::open(&path)?);

        // Publish before dropping the frozen table so readers never miss it.
        self.runs.write().push(run);
        self.memtables.clear_immutable();
        state.pending_wal_offset = None;
        state.next_run_id += 1;

        debug!(
            "run {} published: keys {}..={}, covers WAL up to {}",
            meta.id, meta.min_key, meta.max_key, meta.wal_offset
        );
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        let wal_bytes = self.wal.lock().offset();
        let runs = self.runs.read();
        Stats {
            memtable_entries: self.memtables.active_len(),
            immutable_entries: self.memtables.immutable_len(),
            runs: runs.len(),
            run_entries: runs.iter().map(|run| run.meta().entry_count).sum(),
            wal_bytes,
        }
    }

    /// Sync the WAL and release every handle.
    pub fn close(self) -> Result<()> {
        let DB { wal, options, .. } = self;
        wal.into_inner().close()?;
        info!("closed {}", options.wal_path.display());
        Ok(())
    }

    fn run_path(&self, id: u64) -> PathBuf {
        self.dir
            .join(format!("{}-{id:06}{RUN_SUFFIX}", self.run_prefix))
    }
}

/// Runs are named after the WAL's file stem.
fn run_prefix(wal_path: &Path) -> Result<String> {
    wal_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            Error::InvalidArgument(format!(
                "WAL path {} has no usable file name",
                wal_path.display()
            ))
        })
}

/// Open every finished run belonging to this WAL, oldest first.
fn load_runs(dir: &Path, prefix: &str) -> Result<Vec<SSTable>> {
    let mut runs = Vec::new();
    let name_prefix = format!("{prefix}-");

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(rest) = name.strip_prefix(&name_prefix) else {
            continue;
        };

        if parse_run_id(rest, TMP_RUN_SUFFIX).is_some() {
            info!("removing unfinished run {name}");
            fs::remove_file(entry.path())?;
            continue;
        }
        let Some(id) = parse_run_id(rest, RUN_SUFFIX) else {
            continue;
        };

        let run = SSTable::open(&entry.path())?;
        if run.meta().id != id {
            return Err(Error::Corruption(format!(
                "{name} claims to be run {}",
                run.meta().id
            )));
        }
        runs.push(run);
    }

    runs.sort_by_key(|run| run.meta().id);
    Ok(runs)
}

/// `000042.sst` → 42. Anything but digits before the suffix belongs to
/// some other WAL sharing the directory.
fn parse_run_id(rest: &str, suffix: &str) -> Option<u64> {
    let id = rest.strip_suffix(suffix)?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Re-apply WAL records not yet covered by a run. Returns how many were
/// applied.
fn replay_wal(path: &Path, runs: &[SSTable], memtables: &MemTableManager) -> Result<usize> {
    let reader = WalReader::new(path)?;
    let replay_from = runs.iter().map(|run| run.meta().wal_offset).max().unwrap_or(0);
    if reader.len() < replay_from {
        return Err(Error::Corruption(format!(
            "WAL {} is {} bytes but runs cover up to {replay_from}",
            path.display(),
            reader.len()
        )));
    }

    let mut replayed = 0;
    for item in reader.iter() {
        let (offset, record) = item?;
        if offset < replay_from {
            continue;
        }
        memtables.put(record.key, record.value)?;
        replayed += 1;
    }

    let valid_len = reader.valid_len();
    if valid_len < reader.len() {
        warn!(
            "{}: dropping {} bytes of torn record at end of WAL",
            path.display(),
            reader.len() - valid_len
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(valid_len)?;
        file.sync_all()?;
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_ids_need_digits_only() {
        assert_eq!(parse_run_id("000042.sst", RUN_SUFFIX), Some(42));
        assert_eq!(parse_run_id("000042.sst.tmp", TMP_RUN_SUFFIX), Some(42));
        assert_eq!(parse_run_id("x-000001.sst.tmp", TMP_RUN_SUFFIX), None);
        assert_eq!(parse_run_id("+1.sst", RUN_SUFFIX), None);
        assert_eq!(parse_run_id(".sst", RUN_SUFFIX), None);
    }

    #[test]
    fn failed_append_is_not_committed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let db = DB::open_with_options(Options::new(&path).memtable_max_entries(None)).unwrap();

        db.put(1, "one").unwrap();
        db.wal.lock().fail_next_append(false);
        assert!(matches!(db.put(2, "lost"), Err(Error::Io(_))));
        assert_eq!(db.get(2).unwrap(), None);

        // The engine keeps working and the failed record never resurfaces.
        db.put(3, "three").unwrap();
        assert_eq!(db.stats().wal_bytes, 14);
        db.close().unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"1:one\n3:three\n");
        let db = DB::open(&path, 2).unwrap();
        assert_eq!(db.get(1).unwrap().as_deref(), Some("one"));
        assert_eq!(db.get(2).unwrap(), None);
        assert_eq!(db.get(3).unwrap().as_deref(), Some("three"));
    }

    #[test]
    fn failed_append_keeps_run_offsets_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let db = DB::open_with_options(Options::new(&path).memtable_max_entries(None)).unwrap();

        db.put(7, "old").unwrap();
        db.wal.lock().fail_next_append(false);
        assert!(db.put(8, "lost").is_err());
        db.put(7, "new").unwrap();
        db.flush().unwrap();
        assert_eq!(db.runs.read()[0].meta().wal_offset, 12);
        db.close().unwrap();

        let db = DB::open(&path, 2).unwrap();
        assert_eq!(db.stats().memtable_entries, 0);
        assert_eq!(db.get(7).unwrap().as_deref(), Some("new"));
        assert_eq!(db.get(8).unwrap(), None);
    }

    #[test]
    fn poisoned_wal_refuses_puts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let db = DB::open(&path, 2).unwrap();

        db.put(1, "one").unwrap();
        db.wal.lock().fail_next_append(true);
        assert!(db.put(2, "lost").is_err());
        assert!(db.put(3, "three").is_err());
        assert_eq!(db.get(2).unwrap(), None);
        assert_eq!(db.get(3).unwrap(), None);
        assert_eq!(db.get(1).unwrap().as_deref(), Some("one"));
    }
}
