//! hadoop — snappy в хадуповском кадрировании (совместимый контейнер).
//!
//! Формат потока: последовательность блоков
//! [BE u32 несжатая длина][BE u32 длина сжатого куска][snappy-кусок].
//! Писатель копит block_size несжатых байтов и выпускает блок целиком.

use anyhow::{Context, Result};
use byteorder::{BigEndian, ByteOrder};

use crate::bytes::reader::Reader;
use crate::bytes::writer::{FlushKind, Writer};
use crate::config;
use crate::dep::Dep;
use crate::error::{ObjectState, Status};

#[derive(Debug, Clone)]
pub struct HadoopSnappyWriterOptions {
    pub buffer_size: usize,
    /// Несжатый размер блока.
    pub block_size: usize,
}

impl Default for HadoopSnappyWriterOptions {
    fn default() -> Self {
        Self {
            buffer_size: config::global().buffer_size,
            block_size: 64 * 1024,
        }
    }
}

impl HadoopSnappyWriterOptions {
    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }

    pub fn with_block_size(mut self, n: usize) -> Self {
        self.block_size = n.max(1);
        self
    }
}

pub struct HadoopSnappyWriter<'a, W: Writer> {
    dest: Dep<'a, W>,
    block: Vec<u8>,
    cursor: usize,
    pos: u64,
    state: ObjectState,
}

impl<'a, W: Writer> HadoopSnappyWriter<'a, W> {
    pub fn new(dest: impl Into<Dep<'a, W>>, options: HadoopSnappyWriterOptions) -> Self {
        Self {
            dest: dest.into(),
            block: vec![0; options.block_size],
            cursor: 0,
            pos: 0,
            state: ObjectState::open(),
        }
    }

    fn emit_block(&mut self) -> Result<()> {
        if self.cursor == 0 {
            return Ok(());
        }
        let raw = &self.block[..self.cursor];
        let compressed = snap::raw::Encoder::new()
            .compress_vec(raw)
            .context("snappy compression")?;
        let mut head = [0u8; 8];
        BigEndian::write_u32(&mut head[0..4], raw.len() as u32);
        BigEndian::write_u32(&mut head[4..8], compressed.len() as u32);
        self.dest.get_mut().write(&head)?;
        self.dest.get_mut().write(&compressed)?;
        self.cursor = 0;
        Ok(())
    }
}

impl<'a, W: Writer> Writer for HadoopSnappyWriter<'a, W> {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.block.len() - self.cursor >= min {
            return Ok(());
        }
        if let Err(e) = self.emit_block() {
            return Err(self.state.fail(e));
        }
        if self.block.len() < min {
            self.block.resize(min, 0);
        }
        Ok(())
    }

    fn available(&self) -> usize {
        self.block.len() - self.cursor
    }

    fn buffer(&mut self) -> &mut [u8] {
        &mut self.block[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
        self.pos += n as u64;
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()?;
        if let Err(e) = self.emit_block() {
            return Err(self.state.fail(e));
        }
        self.dest.get_mut().flush(kind)
    }

    fn healthy(&self) -> bool {
        self.state.healthy()
    }

    fn status(&self) -> Option<Status> {
        self.state.status()
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            if let Err(e) = self.emit_block() {
                let e = self.state.fail(e);
                self.state.close();
                return Err(e);
            }
            self.state.close();
            if self.dest.is_owned() {
                return self.dest.get_mut().close();
            }
        }
        Ok(())
    }
}

pub struct HadoopSnappyReader<'a, R: Reader> {
    src: Dep<'a, R>,
    block: Vec<u8>,
    cursor: usize,
    pos: u64,
    state: ObjectState,
}

impl<'a, R: Reader> HadoopSnappyReader<'a, R> {
    pub fn new(src: impl Into<Dep<'a, R>>) -> Self {
        Self {
            src: src.into(),
            block: Vec::new(),
            cursor: 0,
            pos: 0,
            state: ObjectState::open(),
        }
    }

    /// Прочитать следующий блок. Ok(false) — чистый конец потока.
    fn next_block(&mut self) -> Result<bool> {
        let src = self.src.get_mut();
        let mut head = [0u8; 8];
        if !src.pull(1)? {
            return Ok(false);
        }
        if !src.read_slice(&mut head)? {
            return Err(Status::invalid_argument(format!(
                "truncated hadoop-snappy block header at {}",
                src.pos()
            ))
            .into());
        }
        let raw_len = BigEndian::read_u32(&head[0..4]) as usize;
        let compressed_len = BigEndian::read_u32(&head[4..8]) as usize;
        let mut compressed = Vec::new();
        if !src.read(compressed_len, &mut compressed)? {
            return Err(Status::invalid_argument(format!(
                "truncated hadoop-snappy block at {}",
                src.pos()
            ))
            .into());
        }
        let raw = snap::raw::Decoder::new()
            .decompress_vec(&compressed)
            .context("snappy decompression")?;
        if raw.len() != raw_len {
            return Err(Status::invalid_argument(format!(
                "hadoop-snappy block length mismatch: {} != {}",
                raw.len(),
                raw_len
            ))
            .into());
        }
        self.block = raw;
        self.cursor = 0;
        Ok(true)
    }
}

impl<'a, R: Reader> Reader for HadoopSnappyReader<'a, R> {
    fn pos(&self) -> u64 {
        self.pos
    }

    fn available(&self) -> usize {
        self.block.len() - self.cursor
    }

    fn peek(&self) -> &[u8] {
        &self.block[self.cursor..]
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
        self.pos += n as u64;
    }

    fn pull(&mut self, min: usize) -> Result<bool> {
        self.state.ensure_healthy()?;
        while self.available() < min {
            // хвост текущего блока переезжает в начало следующего окна
            let mut tail = self.block.split_off(self.cursor);
            match self.next_block() {
                Ok(true) => {
                    tail.extend_from_slice(&self.block);
                    self.block = tail;
                    self.cursor = 0;
                }
                Ok(false) => {
                    self.block = tail;
                    self.cursor = 0;
                    return Ok(false);
                }
                Err(e) => return Err(self.state.fail(e)),
            }
        }
        Ok(true)
    }

    fn healthy(&self) -> bool {
        self.state.healthy()
    }

    fn status(&self) -> Option<Status> {
        self.state.status()
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state.close();
            if self.src.is_owned() {
                return self.src.get_mut().close();
            }
        }
        Ok(())
    }
}
