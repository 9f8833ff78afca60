use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::wal::record::WalRecord;

/// Reads WAL records from a file for crash recovery.
///
/// Loads the entire file into memory, then iterates line by line.
/// On startup the engine replays every record into a fresh memtable.
///
/// A trailing line without its newline is a partial write from a crash and
/// is not a record; `valid_len` tells the caller where the last complete
/// record ends so the torn tail can be cut off before appending resumes.
pub struct WalReader {
    data: Vec<u8>,
}

impl WalReader {
    /// Open a WAL file for reading. A missing file reads as empty.
    pub fn new(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(WalReader { data })
    }

    /// Total bytes in the file.
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Byte length up to and including the last newline.
    pub fn valid_len(&self) -> u64 {
        self.data
            .iter()
            .rposition(|b| *b == b'\n')
            .map_or(0, |pos| pos as u64 + 1)
    }

    /// Iterate over all complete records in the WAL.
    pub fn iter(&self) -> WalIterator<'_> {
        WalIterator {
            data: &self.data,
            offset: 0,
            failed: false,
        }
    }
}

/// Iterator over WAL records, yielding `(start offset, record)`.
///
/// Stops silently at a torn tail. A complete line that does not parse is
/// real corruption: it is yielded as an error and iteration ends.
pub struct WalIterator<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Iterator for WalIterator<'a> {
    type Item = Result<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        let remaining = &self.data[self.offset..];
        // No newline left: partial write, not a record.
        let line_len = remaining.iter().position(|b| *b == b'\n')?;
        let start = self.offset;

        match WalRecord::decode(&remaining[..line_len]) {
            Ok(record) => {
                self.offset += line_len + 1;
                Some(Ok((start as u64, record)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(Error::Corruption(format!("WAL offset {start}: {e}"))))
            }
        }
    }
}
