//! writer — группировка записей в чанки.
//!
//! Первым всегда уходит signature-чанк; затем (опционально) metadata-чанк,
//! закодированный транспонированно одной записью. Накопитель переключается
//! между simple и transposed по опциям; чанк закрывается по достижении
//! целевого размера, по Flush или по явной границе.

use anyhow::Result;

use crate::bytes::writer::{FlushKind, Writer};
use crate::chain::Chain;
use crate::chunk::{Chunk, ChunkType, ChunkWriter};
use crate::compress::CompressorOptions;
use crate::config;
use crate::dep::Dep;
use crate::encoding::simple::SimpleEncoder;
use crate::encoding::transpose::TransposeEncoder;
use crate::encoding::ChunkEncoder;
use crate::error::{ObjectState, Status};
use crate::records::position::RecordPosition;

#[derive(Clone)]
pub struct RecordWriterOptions {
    /// Целевой несжатый размер чанка.
    pub chunk_size: u64,
    /// Кодировать чанки транспонированно.
    pub transpose: bool,
    /// Доля чанка на один бакет транспонированного кодека.
    pub bucket_fraction: f64,
    pub compression: CompressorOptions,
    /// Сериализованный RecordsMetadata; пишется сразу после сигнатуры.
    pub metadata: Option<Vec<u8>>,
    /// Выравнивать позицию на границу блока при flush.
    pub pad_to_block_boundary: bool,
}

impl Default for RecordWriterOptions {
    fn default() -> Self {
        let cfg = config::global();
        Self {
            chunk_size: cfg.chunk_size,
            transpose: false,
            bucket_fraction: cfg.bucket_fraction,
            compression: CompressorOptions::default(),
            metadata: None,
            pad_to_block_boundary: cfg.pad_to_block_boundary,
        }
    }
}

impl RecordWriterOptions {
    pub fn with_chunk_size(mut self, n: u64) -> Self {
        self.chunk_size = n.max(1);
        self
    }

    pub fn with_transpose(mut self, on: bool) -> Self {
        self.transpose = on;
        self
    }

    pub fn with_bucket_fraction(mut self, f: f64) -> Self {
        self.bucket_fraction = f;
        self
    }

    pub fn with_compression(mut self, compression: CompressorOptions) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_metadata(mut self, metadata: Option<Vec<u8>>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_pad_to_block_boundary(mut self, on: bool) -> Self {
        self.pad_to_block_boundary = on;
        self
    }

    fn new_encoder(&self) -> Box<dyn ChunkEncoder> {
        if self.transpose {
            let bucket_size =
                ((self.chunk_size as f64 * self.bucket_fraction) as usize).max(1);
            Box::new(TransposeEncoder::with_bucket_size(
                self.compression.clone(),
                bucket_size,
            ))
        } else {
            Box::new(SimpleEncoder::new(self.compression.clone()))
        }
    }
}

pub struct RecordWriter<'a, W: Writer> {
    chunk_writer: ChunkWriter<'a, W>,
    encoder: Box<dyn ChunkEncoder>,
    options: RecordWriterOptions,
    last_record: Option<RecordPosition>,
    state: ObjectState,
}

impl<'a, W: Writer> RecordWriter<'a, W> {
    /// Открыть писатель: сигнатура (и метаданные) уходят сразу.
    pub fn new(dest: impl Into<Dep<'a, W>>, options: RecordWriterOptions) -> Result<Self> {
        let mut chunk_writer = ChunkWriter::new(dest)?;
        let signature = Chunk::new(ChunkType::FileSignature, Vec::new(), 0, 0)?;
        chunk_writer.write_chunk(&signature)?;
        if let Some(metadata) = &options.metadata {
            let chunk = encode_metadata_chunk(metadata, &options)?;
            chunk_writer.write_chunk(&chunk)?;
        }
        let encoder = options.new_encoder();
        Ok(Self {
            chunk_writer,
            encoder,
            options,
            last_record: None,
            state: ObjectState::open(),
        })
    }

    pub fn write_record(&mut self, record: &[u8]) -> Result<()> {
        self.state.ensure_healthy()?;
        let chunk_begin = self.chunk_writer.pos();
        if let Err(e) = self.encoder.add_record(record) {
            return Err(self.state.fail(e));
        }
        self.last_record = Some(RecordPosition::new(
            chunk_begin,
            self.encoder.num_records() - 1,
        ));
        self.maybe_close_chunk()
    }

    pub fn write_record_chain(&mut self, record: &Chain) -> Result<()> {
        self.state.ensure_healthy()?;
        let chunk_begin = self.chunk_writer.pos();
        if let Err(e) = self.encoder.add_record_chain(record) {
            return Err(self.state.fail(e));
        }
        self.last_record = Some(RecordPosition::new(
            chunk_begin,
            self.encoder.num_records() - 1,
        ));
        self.maybe_close_chunk()
    }

    fn maybe_close_chunk(&mut self) -> Result<()> {
        if self.encoder.decoded_data_size() >= self.options.chunk_size {
            return self.write_pending_chunk();
        }
        Ok(())
    }

    /// Закрыть накопленный чанк (если он не пуст).
    pub fn write_pending_chunk(&mut self) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.encoder.num_records() == 0 {
            return Ok(());
        }
        let chunk = match self.encoder.encode() {
            Ok(c) => c,
            Err(e) => return Err(self.state.fail(e)),
        };
        if let Err(e) = self.chunk_writer.write_chunk(&chunk) {
            return Err(self.state.fail(e));
        }
        Ok(())
    }

    /// Принудительная граница чанка + выравнивание на блок.
    pub fn pad_to_block_boundary(&mut self) -> Result<()> {
        self.write_pending_chunk()?;
        let r = self.chunk_writer.pad_to_block_boundary();
        r.map_err(|e| self.state.fail(e))
    }

    pub fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.write_pending_chunk()?;
        if self.options.pad_to_block_boundary {
            let r = self.chunk_writer.pad_to_block_boundary();
            if let Err(e) = r {
                return Err(self.state.fail(e));
            }
        }
        let r = self.chunk_writer.flush(kind);
        r.map_err(|e| self.state.fail(e))
    }

    /// Позиция следующей записи.
    pub fn pos(&self) -> RecordPosition {
        RecordPosition::new(self.chunk_writer.pos(), self.encoder.num_records())
    }

    /// Позиция последней записанной записи.
    pub fn last_pos(&self) -> Option<RecordPosition> {
        self.last_record
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy() && self.chunk_writer.healthy()
    }

    pub fn status(&self) -> Option<Status> {
        self.state.status().or_else(|| self.chunk_writer.status())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            if self.state.healthy() {
                self.flush(FlushKind::FromObject)?;
            }
            self.state.close();
            return self.chunk_writer.close();
        }
        Ok(())
    }
}

/// Метаданные кодируются транспонированным чанком из одной записи.
fn encode_metadata_chunk(metadata: &[u8], options: &RecordWriterOptions) -> Result<Chunk> {
    let mut encoder = TransposeEncoder::new(options.compression.clone());
    encoder.add_record(metadata)?;
    let chunk = encoder.encode()?;
    // тот же формат нагрузки, но тип чанка — metadata
    Chunk::new(
        ChunkType::FileMetadata,
        chunk.data,
        0,
        chunk.header.decoded_data_size(),
    )
}
