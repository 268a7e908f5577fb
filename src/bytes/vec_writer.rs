//! vec_writer — писатель в память (Vec<u8>) с поддержкой seek/truncate.

use anyhow::Result;

use crate::bytes::writer::{FlushKind, Writer};
use crate::error::{ObjectState, Status};

pub struct VecWriter {
    data: Vec<u8>, // len() == вместимость окна; written отмечает реальный хвост
    cursor: usize,
    written: usize, // максимум записанного (для seek назад + size)
    state: ObjectState,
}

impl VecWriter {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            cursor: 0,
            written: 0,
            state: ObjectState::open(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut w = Self::new();
        w.data = vec![0; capacity];
        w
    }

    /// Забрать записанные данные.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.written.max(self.cursor));
        self.data
    }

    /// Просмотр записанных данных без передачи владения.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.written.max(self.cursor)]
    }
}

impl Default for VecWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for VecWriter {
    fn pos(&self) -> u64 {
        self.cursor as u64
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.data.len() - self.cursor < min {
            let new_len = (self.data.len() * 2).max(self.cursor + min).max(64);
            self.data.resize(new_len, 0);
        }
        Ok(())
    }

    fn available(&self) -> usize {
        self.data.len() - self.cursor
    }

    fn buffer(&mut self) -> &mut [u8] {
        &mut self.data[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
        self.written = self.written.max(self.cursor);
    }

    fn flush(&mut self, _kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        self.written = self.written.max(self.cursor);
        if pos > self.written as u64 {
            return Err(Status::out_of_range(format!(
                "seek position {} exceeds written size {}",
                pos, self.written
            ))
            .into());
        }
        self.cursor = pos as usize;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.written.max(self.cursor) as u64)
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        let size = size as usize;
        if size > self.written.max(self.cursor) {
            return Err(Status::out_of_range(format!(
                "truncate size {} exceeds written size {}",
                size,
                self.written.max(self.cursor)
            ))
            .into());
        }
        self.written = size;
        self.cursor = self.cursor.min(size);
        Ok(())
    }

    fn healthy(&self) -> bool {
        self.state.healthy()
    }

    fn status(&self) -> Option<Status> {
        self.state.status()
    }

    fn close(&mut self) -> Result<()> {
        self.state.close();
        Ok(())
    }
}
