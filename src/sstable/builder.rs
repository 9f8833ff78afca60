use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::disk::{self, DiskManager, PageFile, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::sstable::block::BlockBuilder;
use crate::sstable::footer::{encode_index_page, Footer, SSTableMeta, INDEX_KEYS_PER_PAGE};
use crate::sstable::MAX_VALUE_LEN;
use crate::types::Key;

/// Builds a run file from a sorted stream of key-value pairs.
///
/// Build process:
/// 1. Add entries one by one (must be in strictly increasing key order)
/// 2. Entries fill up blocks; when a block is full it's written as a page
/// 3. finish() writes the index and footer pages, fsyncs, and renames the
///    temporary file into place
///
/// Until `finish` returns, nothing exists at the final path. A builder that
/// is dropped without finishing removes its temporary file.
pub struct SSTableBuilder {
    /// Current block being filled with entries.
    block_builder: BlockBuilder,
    /// First key of every data page written so far.
    first_keys: Vec<Key>,
    pages: PageFile,
    path: PathBuf,
    tmp_path: PathBuf,
    id: u64,
    min_key: Option<Key>,
    max_key: Option<Key>,
    entry_count: u64,
    finished: bool,
}

/// Where a run is written before it is renamed into place.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl SSTableBuilder {
    /// Start a run that will live at `path` once finished.
    pub fn new(path: &Path, id: u64) -> Result<Self> {
        let tmp_path = tmp_path_for(path);
        let pages = PageFile::create(&tmp_path)?;
        Ok(SSTableBuilder {
            block_builder: BlockBuilder::new(),
            first_keys: Vec::new(),
            pages,
            path: path.to_path_buf(),
            tmp_path,
            id,
            min_key: None,
            max_key: None,
            entry_count: 0,
            finished: false,
        })
    }

    /// Add a key-value pair. Keys MUST be strictly increasing.
    pub fn add(&mut self, key: Key, value: &str) -> Result<()> {
        if let Some(last) = self.max_key {
            if key <= last {
                return Err(Error::InvalidArgument(format!(
                    "run keys out of order: {key} after {last}"
                )));
            }
        }
        if value.len() > MAX_VALUE_LEN {
            return Err(Error::InvalidArgument(format!(
                "value of {} bytes exceeds run limit of {MAX_VALUE_LEN}",
                value.len()
            )));
        }

        if !self.block_builder.add(key, value) {
            // Block is full — write it out, then add to a fresh block.
            self.flush_block()?;
            if !self.block_builder.add(key, value) {
                return Err(Error::InvalidArgument(format!(
                    "entry for key {key} does not fit in an empty block"
                )));
            }
        }

        if self.min_key.is_none() {
            self.min_key = Some(key);
        }
        self.max_key = Some(key);
        self.entry_count += 1;
        Ok(())
    }

    /// Write the current block as the next data page.
    fn flush_block(&mut self) -> Result<()> {
        if self.block_builder.is_empty() {
            return Ok(());
        }
        let block = std::mem::take(&mut self.block_builder);
        let first_key = block.first_key();
        self.write_payload(&block.build())?;
        self.first_keys.extend(first_key);
        Ok(())
    }

    fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        let mut page = self.pages.allocate_page()?;
        page.set_data(payload)?;
        self.pages.write_page(&page)
    }

    /// Finalize the run: last block, index pages, footer, fsync, rename.
    ///
    /// `wal_offset` is the WAL length the source memtable covers.
    pub fn finish(mut self, wal_offset: u64) -> Result<SSTableMeta> {
        self.flush_block()?;
        let (Some(min_key), Some(max_key)) = (self.min_key, self.max_key) else {
            return Err(Error::InvalidArgument("cannot finish an empty run".into()));
        };

        let data_pages = self.pages.page_count();
        let first_keys = std::mem::take(&mut self.first_keys);
        for chunk in first_keys.chunks(INDEX_KEYS_PER_PAGE) {
            self.write_payload(&encode_index_page(chunk))?;
        }
        let index_pages = self.pages.page_count() - data_pages;

        let footer = Footer {
            run_id: self.id,
            data_pages,
            index_pages,
            entry_count: self.entry_count,
            min_key,
            max_key,
            wal_offset,
        };
        self.write_payload(&footer.encode())?;

        // Data must be on disk before the rename makes the run visible.
        self.pages.sync()?;
        fs::rename(&self.tmp_path, &self.path)?;
        disk::sync_parent_dir(&self.path)?;
        self.finished = true;

        let file_size = u64::from(self.pages.page_count()) * PAGE_SIZE as u64;
        debug!(
            "run {} written: {} entries, {} pages",
            self.id,
            self.entry_count,
            self.pages.page_count()
        );

        Ok(SSTableMeta {
            id: self.id,
            min_key,
            max_key,
            entry_count: self.entry_count,
            wal_offset,
            file_size,
        })
    }
}

impl Drop for SSTableBuilder {
    fn drop(&mut self) {
        if !self.finished {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}
