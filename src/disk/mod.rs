//! Fixed-size pages and the files that hold them.
//!
//! A page is the unit of persisted-run storage: runs are written as a
//! sequence of pages through a `DiskManager`.

pub mod page;
pub mod page_file;

pub use page::{Page, PageId, PAGE_HEADER_SIZE, PAGE_PAYLOAD_SIZE, PAGE_SIZE};
pub use page_file::PageFile;

use crate::error::Result;

/// Allocation, reading and writing of pages on some storage medium.
pub trait DiskManager {
    /// Hand out an empty page with the next unused id.
    fn allocate_page(&mut self) -> Result<Page>;

    /// Persist `page` at the slot named by its id.
    fn write_page(&mut self, page: &Page) -> Result<()>;

    /// Read the page with the given id. Errors if it does not exist.
    fn read_page(&mut self, id: PageId) -> Result<Page>;

    /// Number of pages allocated so far.
    fn page_count(&self) -> u32;

    /// Force written pages to stable storage.
    fn sync(&mut self) -> Result<()>;
}

/// Fsync the directory containing `path` so a create or rename inside it
/// survives a crash. A no-op where directories cannot be opened as files.
pub fn sync_parent_dir(path: &std::path::Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => std::path::Path::new("."),
        };
        std::fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
