use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use log::{error, warn};

use crate::error::Result;
use crate::wal::record::WalRecord;

/// Appends WAL records to a file on disk.
///
/// Every write must be durable before it's acknowledged to the client, so
/// `append` writes the encoded record straight to the file and then calls
/// `sync_data()` (OS page cache → physical disk). There is no user-space
/// buffer: a failed record must never linger and ride along with the next
/// one.
///
/// `offset` is the length of the committed log. If an append fails, the
/// file is cut back to `offset` before the error is returned. If that cut
/// fails too, the writer is poisoned and refuses further appends.
pub struct WalWriter {
    file: File,
    offset: u64,
    poisoned: bool,
    #[cfg(test)]
    faults: Faults,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    sync: bool,
    rollback: bool,
}

impl WalWriter {
    /// Open (or create) the WAL at `path`. Existing content is kept and the
    /// offset starts at the current file length.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();

        Ok(WalWriter {
            file,
            offset,
            poisoned: false,
            #[cfg(test)]
            faults: Faults::default(),
        })
    }

    /// Append a record and fsync. Returns only once the record is durable.
    ///
    /// On error the record is not committed: nothing of it remains in the
    /// log and the offset is unchanged.
    pub fn append(&mut self, record: &WalRecord) -> Result<()> {
        if self.poisoned {
            return Err(io::Error::other("WAL is unusable after a failed rollback").into());
        }
        let encoded = record.encode();

        if let Err(e) = self.write_durable(&encoded) {
            self.rollback();
            return Err(e.into());
        }
        self.offset += encoded.len() as u64;

        Ok(())
    }

    fn write_durable(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        #[cfg(test)]
        if std::mem::take(&mut self.faults.sync) {
            return Err(io::Error::other("injected sync failure"));
        }
        self.file.sync_data()
    }

    /// Drop whatever part of a failed record reached the file.
    fn rollback(&mut self) {
        let result = self.truncate_to_offset().and_then(|()| self.file.sync_data());
        match result {
            Ok(()) => warn!("WAL append failed, log cut back to {} bytes", self.offset),
            Err(e) => {
                error!("WAL rollback to {} bytes failed: {e}", self.offset);
                self.poisoned = true;
            }
        }
    }

    fn truncate_to_offset(&mut self) -> io::Result<()> {
        #[cfg(test)]
        if std::mem::take(&mut self.faults.rollback) {
            return Err(io::Error::other("injected truncate failure"));
        }
        self.file.set_len(self.offset)
    }

    /// Force the log to disk, including metadata.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// End of the committed log in bytes.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[cfg(test)]
    fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Sync and release the handle.
    pub fn close(mut self) -> Result<()> {
        self.sync()
    }

    /// Make the next append write its bytes and then fail before fsync.
    /// With `rollback`, cutting the file back fails as well.
    #[cfg(test)]
    pub(crate) fn fail_next_append(&mut self, rollback: bool) {
        self.faults.sync = true;
        self.faults.rollback = rollback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::WalReader;
    use tempfile::tempdir;

    #[test]
    fn failed_append_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut writer = WalWriter::open(&path).unwrap();

        writer.append(&WalRecord::new(1, "one")).unwrap();
        let committed = writer.offset();

        writer.fail_next_append(false);
        assert!(writer.append(&WalRecord::new(2, "lost")).is_err());
        assert_eq!(writer.offset(), committed);
        assert!(!writer.is_poisoned());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), committed);

        writer.append(&WalRecord::new(3, "three")).unwrap();
        writer.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"1:one\n3:three\n");
        let reader = WalReader::new(&path).unwrap();
        let keys: Vec<_> = reader.iter().map(|item| item.unwrap().1.key).collect();
        assert_eq!(keys, vec![1, 3]);
    }

    #[test]
    fn failed_rollback_poisons_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wal");
        let mut writer = WalWriter::open(&path).unwrap();

        writer.append(&WalRecord::new(1, "one")).unwrap();
        writer.fail_next_append(true);
        assert!(writer.append(&WalRecord::new(2, "lost")).is_err());
        assert!(writer.is_poisoned());

        assert!(writer.append(&WalRecord::new(3, "three")).is_err());
        assert_eq!(writer.offset(), 6);
        // The refused append wrote nothing.
        assert_eq!(std::fs::read(&path).unwrap(), b"1:one\n2:lost\n");
    }
}
