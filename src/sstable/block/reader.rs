use crate::error::{Error, Result};
use crate::sstable::Decoder;
use crate::types::{Key, Value};

/// A decoded data block: the sorted entries of one page.
#[derive(Debug)]
pub struct Block {
    entries: Vec<(Key, Value)>,
}

impl Block {
    /// Decode a block from a page payload, verifying its checksum.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut header = Decoder::new(payload);
        let count = header.u16()? as usize;
        let used = header.u16()? as usize;
        let stored_crc = header.u32()?;

        let data = header.bytes(used)?;
        let computed_crc = crc32fast::hash(data);
        if stored_crc != computed_crc {
            return Err(Error::Corruption("block CRC mismatch".into()));
        }

        let mut decoder = Decoder::new(data);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = decoder.i64()?;
            let len = decoder.u32()? as usize;
            let value = std::str::from_utf8(decoder.bytes(len)?)
                .map_err(|e| Error::Corruption(format!("block value is not UTF-8: {e}")))?;
            entries.push((key, value.to_owned()));
        }
        if decoder.position() != used {
            return Err(Error::Corruption("block has trailing bytes".into()));
        }

        Ok(Block { entries })
    }

    /// Binary search for `key` within the block.
    pub fn get(&self, key: Key) -> Option<&str> {
        self.entries
            .binary_search_by_key(&key, |(k, _)| *k)
            .ok()
            .map(|i| self.entries[i].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Key, Value)] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sstable::block::BlockBuilder;

    #[test]
    fn decode_built_block() {
        let mut builder = BlockBuilder::new();
        for k in [-5, 0, 9] {
            assert!(builder.add(k, &format!("v{k}")));
        }
        let block = Block::decode(&builder.build()).unwrap();
        assert_eq!(block.len(), 3);
        assert_eq!(block.get(-5), Some("v-5"));
        assert_eq!(block.get(9), Some("v9"));
        assert_eq!(block.get(1), None);
    }

    #[test]
    fn detects_flipped_byte() {
        let mut builder = BlockBuilder::new();
        builder.add(1, "one");
        let mut payload = builder.build();
        let last = payload.len() - 1;
        payload[last] ^= 0x01;
        assert!(matches!(Block::decode(&payload), Err(Error::Corruption(_))));
    }

    #[test]
    fn zero_padding_after_block_is_ignored() {
        let mut builder = BlockBuilder::new();
        builder.add(1, "one");
        let mut payload = builder.build();
        payload.resize(4092, 0);
        let block = Block::decode(&payload).unwrap();
        assert_eq!(block.get(1), Some("one"));
    }
}
