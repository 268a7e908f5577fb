//! writer — запись чанков с поддержанием выравнивания.

use anyhow::Result;

use crate::bytes::writer::{FlushKind, Writer};
use crate::chunk::header::ChunkType;
use crate::chunk::{
    chunk_end, is_possible_chunk_boundary, remaining_in_block, Chunk,
};
use crate::consts::{BLOCK_SIZE, CHUNK_HEADER_SIZE};
use crate::dep::Dep;
use crate::error::{ObjectState, Status};
use crate::metrics::record_chunk_written;

pub struct ChunkWriter<'a, W: Writer> {
    dest: Dep<'a, W>,
    pos: u64,
    state: ObjectState,
}

impl<'a, W: Writer> ChunkWriter<'a, W> {
    /// Начать запись с текущей позиции dest; недопустимая позиция
    /// заполняется нулями до границы блока.
    pub fn new(dest: impl Into<Dep<'a, W>>) -> Result<Self> {
        let mut dest = dest.into();
        let mut pos = dest.get().pos();
        if !is_possible_chunk_boundary(pos) {
            let fill = remaining_in_block(pos);
            dest.get_mut().write_zeros(fill)?;
            pos += fill;
        }
        Ok(Self {
            dest,
            pos,
            state: ObjectState::open(),
        })
    }

    /// Позиция следующего чанка.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_chunk(&mut self, chunk: &Chunk) -> Result<()> {
        self.state.ensure_healthy()?;
        debug_assert_eq!(
            chunk.header.data_hash(),
            crate::hash::hash_bytes(&chunk.data),
            "wrong chunk data hash"
        );
        match self.write_chunk_impl(chunk) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    fn write_chunk_impl(&mut self, chunk: &Chunk) -> Result<()> {
        debug_assert!(is_possible_chunk_boundary(self.pos));
        let begin = self.pos;
        let end = chunk_end(&chunk.header, begin);
        let dest = self.dest.get_mut();
        dest.write(chunk.header.bytes().as_slice())?;
        dest.write(&chunk.data)?;
        let written = begin + CHUNK_HEADER_SIZE + chunk.data.len() as u64;
        if end > written {
            // хвост блока, в котором заголовку негде начаться
            dest.write_zeros(end - written)?;
        }
        self.pos = end;
        record_chunk_written(
            end - begin,
            chunk.header.chunk_type() == Some(ChunkType::Padding),
        );
        Ok(())
    }

    /// Дотянуть позицию до границы блока (padding-чанк или нулевой хвост).
    pub fn pad_to_block_boundary(&mut self) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.pos % BLOCK_SIZE == 0 {
            return Ok(());
        }
        let remaining = remaining_in_block(self.pos);
        if remaining < CHUNK_HEADER_SIZE {
            log::debug!("zero-fill {} bytes to block boundary at {}", remaining, self.pos);
            let r = self.dest.get_mut().write_zeros(remaining);
            if let Err(e) = r {
                return Err(self.state.fail(e));
            }
            self.pos += remaining;
            return Ok(());
        }
        log::debug!(
            "padding chunk of {} bytes at {}",
            remaining - CHUNK_HEADER_SIZE,
            self.pos
        );
        let data = vec![0u8; (remaining - CHUNK_HEADER_SIZE) as usize];
        let chunk = Chunk::new(ChunkType::Padding, data, 0, 0)?;
        self.write_chunk(&chunk)
    }

    pub fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()?;
        let r = self.dest.get_mut().flush(kind);
        r.map_err(|e| self.state.fail(e))
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Option<Status> {
        self.state.status()
    }

    pub fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state.close();
            if self.dest.is_owned() {
                return self.dest.get_mut().close();
            }
        }
        Ok(())
    }

    /// Нижний писатель (например, для прямого flush).
    pub fn dest(&mut self) -> &mut W {
        self.dest.get_mut()
    }
}
