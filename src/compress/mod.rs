//! compress — кодеки встроенных сжатых потоков (L2).
//!
//! Формат встроенного потока: для кодека != None первым идёт varint
//! несжатого размера, дальше байты кодека; для None — сырые байты.

pub mod compressor;
pub mod decompressor;
pub mod hadoop;
pub(crate) mod pool;

pub use compressor::Compressor;
pub use decompressor::{uncompressed_size_of, Decompressor};
pub use hadoop::{HadoopSnappyReader, HadoopSnappyWriter, HadoopSnappyWriterOptions};

use crate::config;
use crate::consts::{
    COMPRESSION_BROTLI, COMPRESSION_NONE, COMPRESSION_SNAPPY, COMPRESSION_ZSTD,
};
use std::fmt;

/// Кодек встроенного сжатого потока.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionType {
    #[default]
    None,
    Brotli,
    Zstd,
    Snappy,
}

impl CompressionType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            COMPRESSION_NONE => Some(Self::None),
            COMPRESSION_BROTLI => Some(Self::Brotli),
            COMPRESSION_ZSTD => Some(Self::Zstd),
            COMPRESSION_SNAPPY => Some(Self::Snappy),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::None => COMPRESSION_NONE,
            Self::Brotli => COMPRESSION_BROTLI,
            Self::Zstd => COMPRESSION_ZSTD,
            Self::Snappy => COMPRESSION_SNAPPY,
        }
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Brotli => "brotli",
            Self::Zstd => "zstd",
            Self::Snappy => "snappy",
        };
        f.write_str(s)
    }
}

/// Настройки компрессора.
#[derive(Debug, Clone)]
pub struct CompressorOptions {
    pub compression: CompressionType,

    /// zstd: уровень сжатия, -32..=22.
    pub zstd_level: i32,
    /// zstd: window log 10..=31 или -1 (авто).
    pub zstd_window_log: i32,
    /// zstd: контрольная сумма кадра.
    pub store_checksum: bool,
    /// zstd: точный итоговый размер; несовпадение фатально.
    pub final_size: Option<u64>,

    /// brotli: качество 0..=11.
    pub brotli_quality: u32,
    /// brotli: window log 10..=30 или -1 (авто по size_hint/данным).
    pub brotli_window_log: i32,

    /// Подсказка об общем размере (необязательная, только оптимизация).
    pub size_hint: Option<u64>,
}

impl Default for CompressorOptions {
    fn default() -> Self {
        let cfg = config::global();
        Self {
            compression: CompressionType::None,
            zstd_level: cfg.zstd_level,
            zstd_window_log: -1,
            store_checksum: false,
            final_size: None,
            brotli_quality: cfg.brotli_quality,
            brotli_window_log: -1,
            size_hint: None,
        }
    }
}

impl CompressorOptions {
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level.clamp(-32, 22);
        self
    }

    pub fn with_zstd_window_log(mut self, log: i32) -> Self {
        self.zstd_window_log = log;
        self
    }

    pub fn with_store_checksum(mut self, on: bool) -> Self {
        self.store_checksum = on;
        self
    }

    pub fn with_final_size(mut self, size: Option<u64>) -> Self {
        self.final_size = size;
        self
    }

    pub fn with_brotli_quality(mut self, quality: u32) -> Self {
        self.brotli_quality = quality.min(11);
        self
    }

    pub fn with_brotli_window_log(mut self, log: i32) -> Self {
        self.brotli_window_log = log;
        self
    }

    pub fn with_size_hint(mut self, hint: Option<u64>) -> Self {
        self.size_hint = hint;
        self
    }
}
