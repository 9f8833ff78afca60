use crate::error::{Error, Result};

/// Size of a serialized page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Bytes taken by the page id at the front of a serialized page.
pub const PAGE_HEADER_SIZE: usize = 4;

/// Bytes of payload a page can carry.
pub const PAGE_PAYLOAD_SIZE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Page identifiers are signed 32-bit, stored little-endian.
pub type PageId = i32;

/// A fixed-size block of storage.
///
/// On-disk format:
/// ```text
/// ┌───────────┬──────────────────────────────┐
/// │ ID (4B LE)│ Payload (PAGE_SIZE - 4 bytes)│
/// └───────────┴──────────────────────────────┘
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    id: PageId,
    data: Box<[u8; PAGE_PAYLOAD_SIZE]>,
}

impl Page {
    /// Create a zero-filled page with the given id.
    pub fn new(id: PageId) -> Self {
        Page {
            id,
            data: Box::new([0u8; PAGE_PAYLOAD_SIZE]),
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn set_id(&mut self, id: PageId) {
        self.id = id;
    }

    /// The full payload, always `PAGE_PAYLOAD_SIZE` bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Copy `data` to the start of the payload. The rest is left as is.
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > PAGE_PAYLOAD_SIZE {
            return Err(Error::InvalidArgument(format!(
                "data exceeds page payload: {} > {} bytes",
                data.len(),
                PAGE_PAYLOAD_SIZE
            )));
        }
        self.data[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Serialize to exactly `PAGE_SIZE` bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.data[..]);
        buf
    }

    /// Deserialize a page. The input must be exactly `PAGE_SIZE` bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(Error::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }
        let (id_bytes, payload) = bytes.split_at(PAGE_HEADER_SIZE);
        let mut id = [0u8; PAGE_HEADER_SIZE];
        id.copy_from_slice(id_bytes);

        let mut page = Page::new(PageId::from_le_bytes(id));
        page.data.copy_from_slice(payload);
        Ok(page)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("payload_len", &PAGE_PAYLOAD_SIZE)
            .finish()
    }
}
