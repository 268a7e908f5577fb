//! encoding — кодеки чанков (L4): simple и transposed.
//!
//! ChunkEncoder копит записи и выпускает чанк; ChunkDecoder разворачивает
//! чанк в линейный поток значений + границы записей (limits).

pub mod projection;
pub mod simple;
pub mod transpose;

use anyhow::Result;

use crate::chain::Chain;
use crate::chunk::{Chunk, ChunkType};
use crate::encoding::projection::FieldProjection;
use crate::error::{ObjectState, Status};

/// Накопитель записей одного чанка.
pub trait ChunkEncoder {
    fn add_record(&mut self, record: &[u8]) -> Result<()>;

    fn add_record_chain(&mut self, record: &Chain) -> Result<()> {
        self.add_record(&record.to_vec())
    }

    fn num_records(&self) -> u64;

    /// Суммарный несжатый размер записей.
    fn decoded_data_size(&self) -> u64;

    /// Выпустить чанк и очистить накопитель.
    fn encode(&mut self) -> Result<Chunk>;

    fn clear(&mut self);
}

/// Раскодированный чанк: линейные значения + границы записей.
///
/// limits[i] — конец записи i в values; запись i занимает
/// values[limits[i-1]..limits[i]] (limits[-1] == 0).
pub struct ChunkDecoder {
    projection: FieldProjection,
    values: Vec<u8>,
    limits: Vec<usize>,
    index: u64,
    state: ObjectState,
}

impl ChunkDecoder {
    pub fn new(projection: FieldProjection) -> Self {
        Self {
            projection,
            values: Vec::new(),
            limits: Vec::new(),
            index: 0,
            state: ObjectState::open(),
        }
    }

    pub fn projection(&self) -> &FieldProjection {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: FieldProjection) {
        self.projection = projection;
        self.clear();
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.limits.clear();
        self.index = 0;
        self.state = ObjectState::open();
    }

    /// Развернуть чанк. Сервисные чанки (signature/metadata/padding)
    /// дают ноль записей.
    pub fn decode(&mut self, chunk: &Chunk) -> Result<()> {
        self.clear();
        let r = self.decode_impl(chunk);
        match r {
            Ok(()) => Ok(()),
            Err(e) => {
                self.values.clear();
                self.limits.clear();
                Err(self.state.fail(e))
            }
        }
    }

    fn decode_impl(&mut self, chunk: &Chunk) -> Result<()> {
        let num_records = chunk.header.num_records();
        let decoded_data_size = chunk.header.decoded_data_size();
        match chunk.header.chunk_type() {
            Some(ChunkType::FileSignature)
            | Some(ChunkType::FileMetadata)
            | Some(ChunkType::Padding) => Ok(()),
            Some(ChunkType::Simple) => {
                let (values, limits) =
                    simple::decode(&chunk.data, num_records, decoded_data_size)?;
                self.values = values;
                self.limits = limits;
                Ok(())
            }
            Some(ChunkType::Transposed) => {
                let (values, limits) = transpose::decode::decode(
                    &chunk.data,
                    num_records,
                    decoded_data_size,
                    &self.projection,
                )?;
                self.values = values;
                self.limits = limits;
                Ok(())
            }
            None => Err(Status::invalid_argument(format!(
                "unknown chunk type: 0x{:02x}",
                chunk.header.chunk_type_byte()
            ))
            .into()),
        }
    }

    pub fn num_records(&self) -> u64 {
        self.limits.len() as u64
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn set_index(&mut self, index: u64) {
        self.index = index.min(self.limits.len() as u64);
    }

    /// Следующая запись (копия байтов) либо None в конце чанка.
    pub fn read_record(&mut self) -> Option<Vec<u8>> {
        let i = self.index as usize;
        if i >= self.limits.len() {
            return None;
        }
        let begin = if i == 0 { 0 } else { self.limits[i - 1] };
        let end = self.limits[i];
        self.index += 1;
        Some(self.values[begin..end].to_vec())
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Option<Status> {
        self.state.status()
    }
}
