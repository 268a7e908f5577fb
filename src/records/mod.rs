//! records — слой записей (L5): writer/reader, позиции, поиск, recovery.

pub mod position;
pub mod reader;
pub mod writer;

pub use position::RecordPosition;
pub use reader::{RecordReader, RecordReaderOptions};
pub use writer::{RecordWriter, RecordWriterOptions};
