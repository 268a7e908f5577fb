#![allow(non_snake_case)]

// Базовые модули
pub mod chain;
pub mod config;
pub mod consts;
pub mod dep;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod varint;

// Модульная раскладка (папки с mod.rs)
pub mod bytes; // src/bytes/{mod,reader,writer,backward,...}.rs
pub mod chunk; // src/chunk/{mod,header,writer,reader}.rs
pub mod compress; // src/compress/{mod,compressor,decompressor,pool,hadoop}.rs
pub mod encoding; // src/encoding/{mod,simple,projection,transpose}.rs
pub mod records; // src/records/{mod,position,writer,reader}.rs

// Удобные реэкспорты
pub use chain::Chain;
pub use chunk::{Chunk, ChunkHeader, ChunkType, SkippedRegion};
pub use compress::{CompressionType, CompressorOptions};
pub use config::SheafConfig;
pub use encoding::projection::{Field, FieldProjection};
pub use error::{status_code, Status, StatusCode};
pub use records::{
    RecordPosition, RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions,
};
