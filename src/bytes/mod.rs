//! bytes — примитивы байтовых потоков (L1).
//!
//! Reader/Writer с курсорным протоколом поверх уже-подтянутых/уже-
//! зарезервированных байтов, BackwardWriter для кодеков, узнающих длины
//! постфактум, scratch-спасение для источников с «коротким» окном,
//! и конкретные реализации: память, верёвка, файлы, обёртки.

pub mod backward;
pub mod bytes_reader;
pub mod chain_reader;
pub mod chain_writer;
pub mod digesting;
pub mod file_reader;
pub mod file_writer;
pub mod length_delimited;
pub mod limiting;
pub(crate) mod pullable;
pub(crate) mod pushable;
pub mod reader;
pub mod splitting;
pub mod vec_writer;
pub mod writer;

pub use backward::{BackwardWriter, VecBackwardWriter};
pub use bytes_reader::BytesReader;
pub use chain_reader::ChainReader;
pub use chain_writer::ChainWriter;
pub use digesting::{DigestingReader, DigestingWriter};
pub use file_reader::{FileReader, FileReaderOptions};
pub use file_writer::{FileWriter, FileWriterOptions};
pub use length_delimited::{
    length_delimited_size, read_length_delimited, write_length_delimited,
    write_length_delimited_chain,
};
pub use limiting::LimitingWriter;
pub use reader::Reader;
pub use splitting::SplittingWriter;
pub use vec_writer::VecWriter;
pub use writer::{FlushKind, Writer};
