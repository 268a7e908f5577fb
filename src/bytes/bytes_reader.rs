//! bytes_reader — чтение из непрерывного буфера без копирования.
//!
//! Окно — весь остаток буфера, pull() ничего не подтягивает.
//! Поддерживает seek/size; подходит и для Vec<u8>, и для срезов.

use anyhow::Result;

use crate::bytes::reader::Reader;
use crate::error::Status;

pub struct BytesReader<T: AsRef<[u8]>> {
    src: T,
    cursor: usize,
}

impl<T: AsRef<[u8]>> BytesReader<T> {
    pub fn new(src: T) -> Self {
        Self { src, cursor: 0 }
    }

    pub fn into_inner(self) -> T {
        self.src
    }
}

impl<T: AsRef<[u8]>> Reader for BytesReader<T> {
    fn pos(&self) -> u64 {
        self.cursor as u64
    }

    fn available(&self) -> usize {
        self.src.as_ref().len() - self.cursor
    }

    fn peek(&self) -> &[u8] {
        &self.src.as_ref()[self.cursor..]
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
    }

    fn pull(&mut self, min: usize) -> Result<bool> {
        Ok(self.available() >= min)
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        let len = self.src.as_ref().len() as u64;
        if pos > len {
            return Err(Status::out_of_range(format!(
                "seek position {} exceeds data size {}",
                pos, len
            ))
            .into());
        }
        self.cursor = pos as usize;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.src.as_ref().len() as u64)
    }
}
