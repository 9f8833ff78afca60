use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::disk::page::{Page, PageId, PAGE_SIZE};
use crate::disk::DiskManager;
use crate::error::{Error, Result};

/// A file holding a dense array of pages. Page `n` starts at byte
/// `n * PAGE_SIZE`.
pub struct PageFile {
    file: File,
    page_count: u32,
}

impl PageFile {
    /// Create a new, empty page file. Truncates anything already at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(PageFile {
            file,
            page_count: 0,
        })
    }

    /// Open an existing page file read-only.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(Error::Corruption(format!(
                "{}: length {len} is not a multiple of the page size",
                path.display()
            )));
        }
        let page_count = u32::try_from(len / PAGE_SIZE as u64)
            .map_err(|_| Error::Corruption(format!("{}: too many pages", path.display())))?;
        Ok(PageFile { file, page_count })
    }

    fn offset_of(id: PageId) -> u64 {
        id as u64 * PAGE_SIZE as u64
    }

    fn check_id(&self, id: PageId) -> Result<()> {
        if id < 0 || id as u32 >= self.page_count {
            return Err(Error::PageNotFound(id));
        }
        Ok(())
    }
}

impl DiskManager for PageFile {
    fn allocate_page(&mut self) -> Result<Page> {
        let id = PageId::try_from(self.page_count)
            .map_err(|_| Error::InvalidArgument("page file is full".into()))?;
        self.page_count += 1;
        Ok(Page::new(id))
    }

    fn write_page(&mut self, page: &Page) -> Result<()> {
        self.check_id(page.id())?;
        self.file.seek(SeekFrom::Start(Self::offset_of(page.id())))?;
        self.file.write_all(&page.serialize())?;
        Ok(())
    }

    fn read_page(&mut self, id: PageId) -> Result<Page> {
        self.check_id(id)?;
        let mut buf = vec![0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(Self::offset_of(id)))?;
        self.file.read_exact(&mut buf)?;

        let page = Page::deserialize(&buf)?;
        if page.id() != id {
            return Err(Error::Corruption(format!(
                "page slot {id} holds page {}",
                page.id()
            )));
        }
        Ok(page)
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
