//! reader — контракт читателя с курсором по уже-подтянутым байтам.
//!
//! Окно (peek) — непрерывный срез доступных байтов; pull(min) гарантирует
//! в нём не меньше min байтов либо сообщает о конце данных. Кодеки с
//! нулевым копированием работают напрямую через peek()/consume().

use anyhow::Result;

use crate::error::Status;
use crate::bytes::writer::Writer;

pub trait Reader {
    /// Логическая позиция в потоке (байты от его начала).
    fn pos(&self) -> u64;

    /// Сколько байтов доступно в окне без обращения к источнику.
    fn available(&self) -> usize;

    /// Окно уже-подтянутых байтов.
    fn peek(&self) -> &[u8];

    /// Потребить n байтов окна. Требование: n <= available().
    fn consume(&mut self, n: usize);

    /// Обеспечить не меньше min байтов в окне.
    ///
    /// Возвращает:
    /// - Ok(true)  — в окне >= min байтов;
    /// - Ok(false) — до конца потока осталось меньше min (позиция не меняется);
    /// - Err(e)    — ошибка источника.
    fn pull(&mut self, min: usize) -> Result<bool>;

    // ---------- производные операции ----------

    fn read_byte(&mut self) -> Result<Option<u8>> {
        if !self.pull(1)? {
            return Ok(None);
        }
        let b = self.peek()[0];
        self.consume(1);
        Ok(Some(b))
    }

    /// Прочитать ровно n байтов в dst (предварительно очищается).
    /// Ok(false) — данных меньше n; всё доступное потреблено.
    fn read(&mut self, n: usize, dst: &mut Vec<u8>) -> Result<bool> {
        dst.clear();
        dst.reserve(n);
        let mut remaining = n;
        while remaining > 0 {
            if self.available() == 0 && !self.pull(1)? {
                return Ok(false);
            }
            let take = self.available().min(remaining);
            dst.extend_from_slice(&self.peek()[..take]);
            self.consume(take);
            remaining -= take;
        }
        Ok(true)
    }

    /// Прочитать ровно dst.len() байтов. Ok(false) — короткое чтение.
    fn read_slice(&mut self, dst: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < dst.len() {
            if self.available() == 0 && !self.pull(1)? {
                return Ok(false);
            }
            let take = self.available().min(dst.len() - filled);
            dst[filled..filled + take].copy_from_slice(&self.peek()[..take]);
            self.consume(take);
            filled += take;
        }
        Ok(true)
    }

    /// Пропустить n байтов. Ok(false) — поток закончился раньше.
    fn skip(&mut self, mut n: u64) -> Result<bool> {
        while n > 0 {
            if self.available() == 0 && !self.pull(1)? {
                return Ok(false);
            }
            let take = (self.available() as u64).min(n) as usize;
            self.consume(take);
            n -= take as u64;
        }
        Ok(true)
    }

    /// Переложить ровно n байтов в dest. Ok(false) — источник кончился раньше.
    fn copy_to(&mut self, mut n: u64, dest: &mut dyn Writer) -> Result<bool> {
        while n > 0 {
            if self.available() == 0 && !self.pull(1)? {
                return Ok(false);
            }
            let take = (self.available() as u64).min(n) as usize;
            dest.write(&self.peek()[..take])?;
            self.consume(take);
            n -= take as u64;
        }
        Ok(true)
    }

    /// Убедиться, что данных больше нет.
    fn verify_end(&mut self) -> Result<()> {
        if self.pull(1)? {
            return Err(Status::invalid_argument(format!(
                "end of data expected at byte {}",
                self.pos()
            ))
            .into());
        }
        Ok(())
    }

    // ---------- опциональные возможности ----------

    fn supports_seek(&self) -> bool {
        false
    }

    fn seek(&mut self, _pos: u64) -> Result<()> {
        Err(Status::unimplemented("seek is not supported by this reader").into())
    }

    fn size(&mut self) -> Result<u64> {
        Err(Status::unimplemented("size is not supported by this reader").into())
    }

    /// Пробросить позицию обратно в источник (общие файловые дескрипторы).
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn healthy(&self) -> bool {
        true
    }

    fn status(&self) -> Option<Status> {
        None
    }

    /// Закрыть читателя; Owned-зависимости закрываются транзитивно.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
