use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::disk::{DiskManager, PageFile, PageId, PAGE_SIZE};
use crate::error::{Error, Result};
use crate::sstable::block::Block;
use crate::sstable::footer::{decode_index_page, Footer, SSTableMeta};
use crate::types::{Key, Value};

/// An opened run file. Supports point lookups.
///
/// On open:
/// 1. Read the footer (last page) → page counts and key range
/// 2. Read the index pages → first key of every data page
/// 3. Ready for queries (data pages read on demand)
pub struct SSTable {
    /// Path to the run file (for debugging/error messages).
    path: PathBuf,
    /// Page file handle; seeking needs exclusive access.
    pages: Mutex<PageFile>,
    /// First key of each data page, ascending. `first_keys[i]` belongs to
    /// page `i`.
    first_keys: Vec<Key>,
    meta: SSTableMeta,
}

impl SSTable {
    /// Open a run file and load its footer and sparse index.
    pub fn open(path: &Path) -> Result<Self> {
        let mut pages = PageFile::open(path)?;
        let page_count = pages.page_count();
        if page_count == 0 {
            return Err(Error::Corruption(format!(
                "{}: run file has no pages",
                path.display()
            )));
        }

        let footer_id = page_id(page_count - 1)?;
        let footer = Footer::decode(pages.read_page(footer_id)?.data())?;
        if u64::from(footer.data_pages) + u64::from(footer.index_pages) + 1 != u64::from(page_count) {
            return Err(Error::Corruption(format!(
                "{}: footer describes {} data + {} index pages, file has {page_count}",
                path.display(),
                footer.data_pages,
                footer.index_pages
            )));
        }

        let mut first_keys = Vec::with_capacity(footer.data_pages as usize);
        for n in footer.data_pages..footer.data_pages + footer.index_pages {
            let page = pages.read_page(page_id(n)?)?;
            decode_index_page(page.data(), &mut first_keys)?;
        }
        if first_keys.len() != footer.data_pages as usize {
            return Err(Error::Corruption(format!(
                "{}: index lists {} pages, footer says {}",
                path.display(),
                first_keys.len(),
                footer.data_pages
            )));
        }

        let meta = SSTableMeta {
            id: footer.run_id,
            min_key: footer.min_key,
            max_key: footer.max_key,
            entry_count: footer.entry_count,
            wal_offset: footer.wal_offset,
            file_size: u64::from(page_count) * PAGE_SIZE as u64,
        };

        Ok(SSTable {
            path: path.to_path_buf(),
            pages: Mutex::new(pages),
            first_keys,
            meta,
        })
    }

    /// Point lookup.
    ///
    /// Algorithm:
    /// 1. Key outside [min_key, max_key] → None without any I/O
    /// 2. Binary search the sparse index → the one page that could hold it
    /// 3. Read and decode that page, binary search within it
    pub fn get(&self, key: Key) -> Result<Option<Value>> {
        if key < self.meta.min_key || key > self.meta.max_key {
            return Ok(None);
        }

        // Last page whose first key is <= key.
        let slot = self.first_keys.partition_point(|first| *first <= key);
        let Some(page_index) = slot.checked_sub(1) else {
            return Ok(None);
        };

        let page = self.pages.lock().read_page(page_id(page_index as u32)?)?;
        let block = Block::decode(page.data())
            .map_err(|e| Error::Corruption(format!("{}: {e}", self.path.display())))?;
        Ok(block.get(key).map(str::to_owned))
    }

    /// Every entry in key order. Reads the whole run.
    pub fn entries(&self) -> Result<Vec<(Key, Value)>> {
        let mut out = Vec::with_capacity(self.meta.entry_count as usize);
        let mut pages = self.pages.lock();
        for n in 0..self.first_keys.len() {
            let page = pages.read_page(page_id(n as u32)?)?;
            out.extend(Block::decode(page.data())?.entries().iter().cloned());
        }
        Ok(out)
    }

    /// Get metadata about this run.
    pub fn meta(&self) -> &SSTableMeta {
        &self.meta
    }
}

fn page_id(n: u32) -> Result<PageId> {
    PageId::try_from(n).map_err(|_| Error::Corruption(format!("page number {n} out of range")))
}
