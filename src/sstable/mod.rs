//! Immutable persisted runs produced by flushing a memtable.
//!
//! A run is a page file laid out as:
//! ```text
//! ┌──────────────┬───────────────┬─────────────┐
//! │ data pages   │ index pages   │ footer page │
//! └──────────────┴───────────────┴─────────────┘
//! ```
//! Data pages hold sorted entries, index pages hold the first key of every
//! data page, and the footer (always the last page) describes the rest.

pub mod block;
pub mod builder;
pub mod footer;
pub mod reader;

pub use builder::SSTableBuilder;
pub use footer::SSTableMeta;
pub use reader::SSTable;

use crate::error::{Error, Result};

/// Largest value a run can hold. Entries never span pages, so this is a page
/// payload minus the block header and one entry header.
pub const MAX_VALUE_LEN: usize = block::MAX_ENTRY_VALUE_LEN;

/// Bounds-checked little-endian reader over a page payload.
pub(crate) struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Decoder { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| Error::Corruption(format!("read of {n} bytes past end of page")))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }
}
