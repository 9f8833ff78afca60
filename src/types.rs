use crate::error::{Error, Result};

/// Keys are signed integers; the whole `i64` range is valid.
pub type Key = i64;

/// Values are UTF-8 strings, written verbatim into the log.
pub type Value = String;

/// Reject values the log format cannot carry.
///
/// An empty value is the "no value" sentinel and is refused outright. A
/// newline would split the record across two log lines. A `:` is fine: the
/// key is always split off at the first one.
pub fn validate_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidArgument("value must not be empty".into()));
    }
    if value.contains('\n') {
        return Err(Error::InvalidArgument(
            "value must not contain a newline".into(),
        ));
    }
    Ok(())
}
