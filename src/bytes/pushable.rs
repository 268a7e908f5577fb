//! pushable — scratch-спасение для писателей с ограниченным окном.
//!
//! Когда реализация не может дать min непрерывных байтов (окно упёрлось в
//! предел сегмента), резервируется scratch-буфер нужного размера; при
//! следующем push/write/flush/close он выгребается в настоящий приёмник.

/// Состояние scratch-буфера писателя.
#[derive(Debug, Default)]
pub(crate) struct WriteScratch {
    buf: Vec<u8>,
    used: usize,
    active: bool,
}

impl WriteScratch {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Зарезервировать окно в min байтов.
    pub fn activate(&mut self, min: usize) {
        self.buf.clear();
        self.buf.resize(min, 0);
        self.used = 0;
        self.active = true;
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.buf.len() - self.used
    }

    #[inline]
    pub fn window(&mut self) -> &mut [u8] {
        &mut self.buf[self.used..]
    }

    #[inline]
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.used += n;
    }

    #[inline]
    pub fn written(&self) -> usize {
        self.used
    }

    /// Погасить scratch; вернуть накопленные байты для выгрузки в приёмник.
    pub fn deactivate(&mut self) -> Vec<u8> {
        self.active = false;
        let mut out = std::mem::take(&mut self.buf);
        out.truncate(self.used);
        self.used = 0;
        out
    }
}
