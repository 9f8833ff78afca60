use crate::error::{Error, Result};
use crate::types::{validate_value, Key, Value};

/// A single committed write in the WAL.
///
/// On-disk format is one UTF-8 line per record:
/// ```text
/// <decimal key>:<value>\n
/// ```
///
/// There is no header, length prefix or checksum. The key never contains a
/// `:`, so the record splits at the first one and the value may contain
/// colons. Values containing a newline are rejected before they get here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub key: Key,
    pub value: Value,
}

impl WalRecord {
    pub fn new(key: Key, value: impl Into<Value>) -> Self {
        WalRecord {
            key,
            value: value.into(),
        }
    }

    /// Serialize this record to its line, including the trailing newline.
    pub fn encode(&self) -> Vec<u8> {
        format!("{}:{}\n", self.key, self.value).into_bytes()
    }

    /// Parse one line. `line` must not include the trailing newline.
    pub fn decode(line: &[u8]) -> Result<Self> {
        let line = std::str::from_utf8(line)
            .map_err(|e| Error::Corruption(format!("record is not UTF-8: {e}")))?;
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| Error::Corruption(format!("record has no separator: {line:?}")))?;
        let key = key
            .parse::<Key>()
            .map_err(|e| Error::Corruption(format!("bad key {key:?}: {e}")))?;
        validate_value(value).map_err(|e| Error::Corruption(e.to_string()))?;
        Ok(WalRecord::new(key, value))
    }

    /// Size of this record when serialized on disk.
    pub fn encoded_size(&self) -> usize {
        // Key digits + ':' + value + '\n'
        self.key.to_string().len() + 1 + self.value.len() + 1
    }
}
