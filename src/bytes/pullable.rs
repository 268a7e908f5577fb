//! pullable — scratch-спасение для читателей с фрагментированным окном.
//!
//! Источник, чьё «родное» окно ограничено (остаток сегмента верёвки),
//! не имеет права занижать available. Вместо этого запрошенный минимум
//! собирается во внутренний scratch-буфер, и окно временно указывает в него.
//! Инварианты:
//! - пока scratch активен, peek() указывает в scratch и len >= запрошенного min;
//! - любое меняющее состояние действие (seek, close) сперва гасит scratch,
//!   переводя логическую позицию обратно на реальные сегменты.
//!
//! У исходника здесь ещё был scoped-guard для move-конструкторов с
//! самоуказателями; в Rust перемещения индексных структур безопасны, так что
//! механизм сведён к явным точкам sync_scratch.

/// Состояние scratch-буфера читателя.
#[derive(Debug, Default)]
pub(crate) struct ReadScratch {
    buf: Vec<u8>,
    cursor: usize,
    active: bool,
    /// Логическая позиция источника, соответствующая buf[0].
    base_pos: u64,
}

impl ReadScratch {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Активировать scratch: bytes — копия данных источника начиная с base_pos.
    pub fn activate(&mut self, bytes: &[u8], base_pos: u64) {
        self.buf.clear();
        self.buf.extend_from_slice(bytes);
        self.cursor = 0;
        self.base_pos = base_pos;
        self.active = true;
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    #[inline]
    pub fn window(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    #[inline]
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.cursor += n;
    }

    #[inline]
    pub fn logical_pos(&self) -> u64 {
        self.base_pos + self.cursor as u64
    }

    /// Погасить scratch; вернуть логическую позицию для восстановления
    /// реального окна.
    pub fn deactivate(&mut self) -> u64 {
        let pos = self.logical_pos();
        self.active = false;
        self.cursor = 0;
        self.buf.clear();
        pos
    }
}
