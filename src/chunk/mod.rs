//! chunk — контейнерный слой (L3): заголовки, выравнивание, запись/чтение.
//!
//! Правила выравнивания:
//! - заголовок чанка (40 байт) никогда не пересекает границу 64 KiB-блока;
//! - если до границы блока остаётся меньше 40 байт, писатель заполняет
//!   хвост нулями, и следующий чанк начинается ровно на границе;
//! - для явного выравнивания есть padding-чанки (нулевая нагрузка).
//! Обе стороны выводят позицию следующего чанка одной формулой (chunk_end),
//! поэтому seek по байтовым смещениям не требует внешнего индекса.

pub mod header;
pub mod reader;
pub mod writer;

pub use header::{ChunkHeader, ChunkType};
pub use reader::ChunkReader;
pub use writer::ChunkWriter;

use std::fmt;

use crate::consts::{BLOCK_SIZE, CHUNK_HEADER_SIZE};

/// Чанк: заголовок + полезная нагрузка.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub header: ChunkHeader,
    pub data: Vec<u8>,
}

impl Chunk {
    /// Собрать чанк, вычислив хэши заголовка.
    pub fn new(
        chunk_type: ChunkType,
        data: Vec<u8>,
        num_records: u64,
        decoded_data_size: u64,
    ) -> anyhow::Result<Self> {
        let header = ChunkHeader::new(&data, chunk_type, num_records, decoded_data_size)?;
        Ok(Self { header, data })
    }
}

/// Пропущенный при восстановлении диапазон байтов.
#[derive(Debug, Clone, Default)]
pub struct SkippedRegion {
    pub begin: u64,
    pub end: u64,
    pub message: String,
}

impl SkippedRegion {
    pub fn new(begin: u64, end: u64, message: impl Into<String>) -> Self {
        Self {
            begin,
            end,
            message: message.into(),
        }
    }

    pub fn length(&self) -> u64 {
        self.end - self.begin
    }
}

impl fmt::Display for SkippedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}): {}", self.begin, self.end, self.message)
    }
}

// ---------- block alignment helpers ----------

/// Байтов до конца блока (полный блок на границе).
#[inline]
pub fn remaining_in_block(pos: u64) -> u64 {
    BLOCK_SIZE - pos % BLOCK_SIZE
}

/// Может ли заголовок чанка начинаться на этой позиции.
#[inline]
pub fn is_possible_chunk_boundary(pos: u64) -> bool {
    pos % BLOCK_SIZE + CHUNK_HEADER_SIZE <= BLOCK_SIZE
}

/// Ближайшая допустимая позиция заголовка (вперёд).
#[inline]
pub fn next_possible_boundary(pos: u64) -> u64 {
    if is_possible_chunk_boundary(pos) {
        pos
    } else {
        pos + remaining_in_block(pos)
    }
}

/// Позиция следующего чанка после чанка с данным заголовком.
/// Включает нулевой хвост блока, если заголовку негде начаться.
#[inline]
pub fn chunk_end(header: &ChunkHeader, chunk_begin: u64) -> u64 {
    next_possible_boundary(chunk_begin + CHUNK_HEADER_SIZE + header.data_size())
}
