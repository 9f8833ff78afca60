use crate::disk::PAGE_PAYLOAD_SIZE;
use crate::error::{Error, Result};
use crate::sstable::Decoder;
use crate::types::Key;

/// Magic number to identify run files.
pub const SSTABLE_MAGIC: u64 = 0x4C44_425F_5255_4E00; // "LDB_RUN\0"

/// First keys stored per index page: count (2B) + crc (4B) + 8B per key.
pub const INDEX_KEYS_PER_PAGE: usize = (PAGE_PAYLOAD_SIZE - 2 - 4) / 8;

/// Metadata about a run, available without touching its data pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SSTableMeta {
    /// Unique run identifier; higher ids are newer.
    pub id: u64,
    /// Smallest key in the run.
    pub min_key: Key,
    /// Largest key in the run.
    pub max_key: Key,
    /// Number of entries.
    pub entry_count: u64,
    /// WAL length when the source memtable was frozen. Every record before
    /// this offset is covered by this run or an older one.
    pub wal_offset: u64,
    /// File size in bytes.
    pub file_size: u64,
}

/// The footer sits in the last page of a run file.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Magic number (8B)                    │
/// │ Run id (8B)                          │
/// │ Data page count (4B)                 │
/// │ Index page count (4B)                │
/// │ Entry count (8B)                     │
/// │ Min key (8B)                         │
/// │ Max key (8B)                         │
/// │ WAL offset (8B)                      │
/// │ CRC of everything above (4B)         │
/// └──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Footer {
    pub run_id: u64,
    pub data_pages: u32,
    pub index_pages: u32,
    pub entry_count: u64,
    pub min_key: Key,
    pub max_key: Key,
    pub wal_offset: u64,
}

impl Footer {
    /// Size of the encoded footer in bytes (fixed).
    pub const SIZE: usize = 8 + 8 + 4 + 4 + 8 + 8 + 8 + 8 + 4;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&SSTABLE_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.run_id.to_le_bytes());
        buf.extend_from_slice(&self.data_pages.to_le_bytes());
        buf.extend_from_slice(&self.index_pages.to_le_bytes());
        buf.extend_from_slice(&self.entry_count.to_le_bytes());
        buf.extend_from_slice(&self.min_key.to_le_bytes());
        buf.extend_from_slice(&self.max_key.to_le_bytes());
        buf.extend_from_slice(&self.wal_offset.to_le_bytes());
        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("footer too short".into()));
        }
        let body = &data[..Self::SIZE - 4];
        let mut d = Decoder::new(data);

        let magic = d.u64()?;
        if magic != SSTABLE_MAGIC {
            return Err(Error::Corruption(format!(
                "bad magic: expected {SSTABLE_MAGIC:#x}, got {magic:#x}"
            )));
        }
        let footer = Footer {
            run_id: d.u64()?,
            data_pages: d.u32()?,
            index_pages: d.u32()?,
            entry_count: d.u64()?,
            min_key: d.i64()?,
            max_key: d.i64()?,
            wal_offset: d.u64()?,
        };
        if d.u32()? != crc32fast::hash(body) {
            return Err(Error::Corruption("footer CRC mismatch".into()));
        }
        Ok(footer)
    }
}

/// Encode up to `INDEX_KEYS_PER_PAGE` first keys into an index page payload.
/// Format: [count(2B)][crc(4B)][key i64 LE]...
pub fn encode_index_page(keys: &[Key]) -> Vec<u8> {
    debug_assert!(keys.len() <= INDEX_KEYS_PER_PAGE);
    let mut body = Vec::with_capacity(keys.len() * 8);
    for key in keys {
        body.extend_from_slice(&key.to_le_bytes());
    }
    let mut buf = Vec::with_capacity(6 + body.len());
    buf.extend_from_slice(&(keys.len() as u16).to_le_bytes());
    buf.extend_from_slice(&crc32fast::hash(&body).to_le_bytes());
    buf.extend_from_slice(&body);
    buf
}

/// Decode an index page payload, appending its keys to `out`.
pub fn decode_index_page(payload: &[u8], out: &mut Vec<Key>) -> Result<()> {
    let mut header = Decoder::new(payload);
    let count = header.u16()? as usize;
    let stored_crc = header.u32()?;
    let body = header.bytes(count * 8)?;
    if crc32fast::hash(body) != stored_crc {
        return Err(Error::Corruption("index page CRC mismatch".into()));
    }
    let mut d = Decoder::new(body);
    for _ in 0..count {
        out.push(d.i64()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Footer {
        Footer {
            run_id: 3,
            data_pages: 12,
            index_pages: 1,
            entry_count: 900,
            min_key: i64::MIN,
            max_key: i64::MAX,
            wal_offset: 4096,
        }
    }

    #[test]
    fn footer_roundtrip() {
        let encoded = sample().encode();
        assert_eq!(encoded.len(), Footer::SIZE);
        assert_eq!(Footer::decode(&encoded).unwrap(), sample());
    }

    #[test]
    fn footer_bad_magic() {
        let mut encoded = sample().encode();
        encoded[0] ^= 0xFF;
        assert!(Footer::decode(&encoded).is_err());
    }

    #[test]
    fn footer_bad_crc() {
        let mut encoded = sample().encode();
        encoded[20] ^= 0x01;
        assert!(matches!(Footer::decode(&encoded), Err(Error::Corruption(_))));
    }

    #[test]
    fn footer_too_short() {
        assert!(Footer::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn full_index_page_fits_payload() {
        let keys: Vec<Key> = (0..INDEX_KEYS_PER_PAGE as i64).collect();
        let encoded = encode_index_page(&keys);
        assert!(encoded.len() <= PAGE_PAYLOAD_SIZE);

        let mut out = Vec::new();
        decode_index_page(&encoded, &mut out).unwrap();
        assert_eq!(out, keys);
    }
}
