pub mod builder;
pub mod reader;

pub use builder::BlockBuilder;
pub use reader::Block;

use crate::disk::PAGE_PAYLOAD_SIZE;

/// count (2B) + used bytes (2B) + crc (4B)
pub const BLOCK_HEADER_SIZE: usize = 2 + 2 + 4;

/// key (8B) + value length (4B)
pub const ENTRY_HEADER_SIZE: usize = 8 + 4;

/// A value this long exactly fills an otherwise empty block.
pub const MAX_ENTRY_VALUE_LEN: usize = PAGE_PAYLOAD_SIZE - BLOCK_HEADER_SIZE - ENTRY_HEADER_SIZE;
