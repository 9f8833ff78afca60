pub mod reader;
pub mod record;
pub mod writer;

pub use reader::WalReader;
pub use record::WalRecord;
pub use writer::WalWriter;
