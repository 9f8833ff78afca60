use crate::disk::PAGE_PAYLOAD_SIZE;
use crate::sstable::block::{BLOCK_HEADER_SIZE, ENTRY_HEADER_SIZE};
use crate::types::Key;

/// Accumulates sorted key-value pairs and serializes them into one page
/// payload.
///
/// On-page layout of a block:
/// ```text
/// ┌───────────┬──────────┬──────────┬─────────────────────────────────┐
/// │ Count(2B) │ Used(2B) │ CRC (4B) │ Entries...                      │
/// └───────────┴──────────┴──────────┴─────────────────────────────────┘
/// Entry: [key i64 LE (8B)][value_len u32 LE (4B)][value bytes]
/// ```
///
/// CRC covers the `Used` bytes of entries. Entries never span blocks.
pub struct BlockBuilder {
    data: Vec<u8>,
    count: u16,
    first_key: Option<Key>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        BlockBuilder {
            data: Vec::new(),
            count: 0,
            first_key: None,
        }
    }

    /// Add a key-value pair to the block.
    /// Returns false if the entry doesn't fit; the block is left unchanged.
    /// Entries MUST be added in sorted key order.
    pub fn add(&mut self, key: Key, value: &str) -> bool {
        let entry_size = ENTRY_HEADER_SIZE + value.len();
        if self.estimated_size() + entry_size > PAGE_PAYLOAD_SIZE {
            return false;
        }

        self.data.extend_from_slice(&key.to_le_bytes());
        self.data.extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.data.extend_from_slice(value.as_bytes());

        self.count += 1;
        if self.first_key.is_none() {
            self.first_key = Some(key);
        }
        true
    }

    /// Finalize the block: header followed by the entries.
    pub fn build(self) -> Vec<u8> {
        let mut block = Vec::with_capacity(self.estimated_size());
        block.extend_from_slice(&self.count.to_le_bytes());
        block.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
        block.extend_from_slice(&crc32fast::hash(&self.data).to_le_bytes());
        block.extend_from_slice(&self.data);
        block
    }

    /// Current size of the block once built.
    pub fn estimated_size(&self) -> usize {
        BLOCK_HEADER_SIZE + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn first_key(&self) -> Option<Key> {
        self.first_key
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}
