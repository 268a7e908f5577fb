//! writer — контракт писателя с курсором по зарезервированному месту.
//!
//! push(min) резервирует в окне не меньше min байтов; write() имеет
//! быстрый путь при available >= len и медленный цикл push+copy иначе.

use anyhow::Result;

use crate::chain::Chain;
use crate::error::Status;

/// Интенсивность сброса данных.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// Достаточно выгрести внутренние буферы объекта.
    FromObject,
    /// Данные у операционной системы.
    FromProcess,
    /// Данные долговечны (fsync).
    FromMachine,
}

pub trait Writer {
    /// Логическая позиция (байты, записанные с начала потока).
    fn pos(&self) -> u64;

    /// Зарезервировать в окне не меньше min байтов.
    fn push(&mut self, min: usize) -> Result<()>;

    /// Размер зарезервированного окна.
    fn available(&self) -> usize;

    /// Зарезервированное окно для прямой записи.
    fn buffer(&mut self) -> &mut [u8];

    /// Зафиксировать n записанных байтов окна. Требование: n <= available().
    fn advance(&mut self, n: usize);

    // ---------- производные операции ----------

    fn write(&mut self, src: &[u8]) -> Result<()> {
        let mut rest = src;
        while !rest.is_empty() {
            if self.available() == 0 {
                self.push(1)?;
            }
            let n = self.available().min(rest.len());
            self.buffer()[..n].copy_from_slice(&rest[..n]);
            self.advance(n);
            rest = &rest[n..];
        }
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.push(1)?;
        self.buffer()[0] = byte;
        self.advance(1);
        Ok(())
    }

    /// Записать верёвку посегментно, без линейной склейки.
    fn write_chain(&mut self, src: &Chain) -> Result<()> {
        for seg in src.segments() {
            self.write(seg)?;
        }
        Ok(())
    }

    fn write_zeros(&mut self, mut n: u64) -> Result<()> {
        while n > 0 {
            if self.available() == 0 {
                self.push(1)?;
            }
            let take = (self.available() as u64).min(n) as usize;
            for b in &mut self.buffer()[..take] {
                *b = 0;
            }
            self.advance(take);
            n -= take as u64;
        }
        Ok(())
    }

    /// Сбросить данные к приёмнику с заданной интенсивностью.
    fn flush(&mut self, kind: FlushKind) -> Result<()>;

    // ---------- опциональные возможности ----------

    fn supports_seek(&self) -> bool {
        false
    }

    fn seek(&mut self, _pos: u64) -> Result<()> {
        Err(Status::unimplemented("seek is not supported by this writer").into())
    }

    fn size(&mut self) -> Result<u64> {
        Err(Status::unimplemented("size is not supported by this writer").into())
    }

    fn truncate(&mut self, _size: u64) -> Result<()> {
        Err(Status::unimplemented("truncate is not supported by this writer").into())
    }

    fn healthy(&self) -> bool {
        true
    }

    fn status(&self) -> Option<Status> {
        None
    }

    /// Закрыть писателя; Owned-зависимости закрываются транзитивно.
    fn close(&mut self) -> Result<()>;
}
