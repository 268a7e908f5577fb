//! backward — писатель, растущий к младшим адресам.
//!
//! Кодеки, узнающие длины после выпуска данных (длины вложенных сообщений),
//! дописывают префиксы без второго прохода: каждый prepend кладёт байты
//! ПЕРЕД уже записанными. Контракт намеренно отдельный от Writer — курсорная
//! арифметика инвертирована, и их смешение каралось бы порчей данных.

use anyhow::Result;

use crate::error::Status;
use crate::varint::{put_varint32, MAX_LEN_VARINT32};

pub trait BackwardWriter {
    /// Сколько байтов записано (окончательный размер данных).
    fn pos(&self) -> u64;

    /// Зарезервировать n байтов перед текущими данными и вернуть их срез.
    fn prepend_buf(&mut self, n: usize) -> Result<&mut [u8]>;

    fn prepend(&mut self, src: &[u8]) -> Result<()> {
        if src.is_empty() {
            return Ok(());
        }
        self.prepend_buf(src.len())?.copy_from_slice(src);
        Ok(())
    }

    fn prepend_zeros(&mut self, n: usize) -> Result<()> {
        if n == 0 {
            return Ok(());
        }
        for b in self.prepend_buf(n)?.iter_mut() {
            *b = 0;
        }
        Ok(())
    }

    fn prepend_varint32(&mut self, value: u32) -> Result<()> {
        let mut tmp = [0u8; MAX_LEN_VARINT32];
        let n = put_varint32(&mut tmp, value);
        self.prepend(&tmp[..n])
    }
}

/// Backward-писатель в память. Данные занимают хвост внутреннего буфера;
/// буфер растёт копированием к старшим адресам.
pub struct VecBackwardWriter {
    buf: Vec<u8>,
    cursor: usize, // индекс первого записанного байта
    size_limit: Option<u64>,
}

impl VecBackwardWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            cursor: 0,
            size_limit: None,
        }
    }

    /// Предвыделить место под ожидаемый размер данных.
    pub fn with_size_hint(size_hint: usize) -> Self {
        Self {
            buf: vec![0; size_hint],
            cursor: size_hint,
            size_limit: None,
        }
    }

    /// Жёсткий предел записанных байтов; превышение — RESOURCE_EXHAUSTED.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.size_limit = Some(limit);
        self
    }

    /// Свободное место перед курсором (интроспекция для тестов быстрого пути).
    pub fn front_capacity(&self) -> usize {
        self.cursor
    }

    /// Забрать данные в прямом порядке.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.split_off(self.cursor)
    }

    fn grow_front(&mut self, need: usize) {
        // рост минимум вдвое, копия старых данных уезжает в хвост
        let old_len = self.buf.len();
        let data_len = old_len - self.cursor;
        let new_len = (old_len * 2).max(old_len + need).max(64);
        let mut new_buf = vec![0u8; new_len];
        new_buf[new_len - data_len..].copy_from_slice(&self.buf[self.cursor..]);
        self.buf = new_buf;
        self.cursor = new_len - data_len;
    }
}

impl Default for VecBackwardWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BackwardWriter for VecBackwardWriter {
    fn pos(&self) -> u64 {
        (self.buf.len() - self.cursor) as u64
    }

    fn prepend_buf(&mut self, n: usize) -> Result<&mut [u8]> {
        if let Some(limit) = self.size_limit {
            if self.pos() + n as u64 > limit {
                return Err(Status::resource_exhausted(format!(
                    "size limit exceeded: {} > {}",
                    self.pos() + n as u64,
                    limit
                ))
                .into());
            }
        }
        if self.cursor < n {
            self.grow_front(n);
        }
        self.cursor -= n;
        Ok(&mut self.buf[self.cursor..self.cursor + n])
    }
}
