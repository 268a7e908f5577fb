//! chain_reader — читатель верёвки (Chain).
//!
//! Окно — остаток текущего сегмента (без копирования). Когда pull(min)
//! требует больше, чем остаток сегмента, минимум собирается в scratch
//! через границы сегментов (см. bytes/pullable.rs).

use anyhow::Result;

use crate::bytes::pullable::ReadScratch;
use crate::bytes::reader::Reader;
use crate::chain::Chain;
use crate::error::Status;

/// Сколько байтов сверх min собирать в scratch за раз.
const SCRATCH_TARGET: usize = 4096;

pub struct ChainReader<'c> {
    chain: &'c Chain,
    seg: usize,
    off: usize,
    base: u64, // позиция начала текущего сегмента
    scratch: ReadScratch,
}

impl<'c> ChainReader<'c> {
    pub fn new(chain: &'c Chain) -> Self {
        Self {
            chain,
            seg: 0,
            off: 0,
            base: 0,
            scratch: ReadScratch::new(),
        }
    }

    fn seg_len(&self) -> usize {
        self.chain
            .segments()
            .get(self.seg)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Перейти к следующему сегменту, когда текущий исчерпан.
    fn normalize(&mut self) {
        while self.seg < self.chain.segments().len() && self.off == self.seg_len() {
            self.base += self.seg_len() as u64;
            self.seg += 1;
            self.off = 0;
        }
    }

    /// Позиционирование по логическому смещению (O(число сегментов)).
    fn reposition(&mut self, pos: u64) {
        self.seg = 0;
        self.off = 0;
        self.base = 0;
        let mut remaining = pos;
        while self.seg < self.chain.segments().len() {
            let len = self.seg_len() as u64;
            if remaining < len {
                self.off = remaining as usize;
                return;
            }
            remaining -= len;
            self.base += len;
            self.seg += 1;
        }
        self.off = remaining as usize; // позиция в конце
    }

    /// Погасить scratch и восстановить реальное окно.
    fn sync_scratch(&mut self) {
        if self.scratch.active() {
            let pos = self.scratch.deactivate();
            self.reposition(pos);
        }
    }
}

impl<'c> Reader for ChainReader<'c> {
    fn pos(&self) -> u64 {
        if self.scratch.active() {
            self.scratch.logical_pos()
        } else {
            self.base + self.off as u64
        }
    }

    fn available(&self) -> usize {
        if self.scratch.active() {
            self.scratch.remaining()
        } else {
            self.seg_len() - self.off
        }
    }

    fn peek(&self) -> &[u8] {
        if self.scratch.active() {
            self.scratch.window()
        } else {
            match self.chain.segments().get(self.seg) {
                Some(s) => &s[self.off..],
                None => &[],
            }
        }
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        if self.scratch.active() {
            self.scratch.consume(n);
            if self.scratch.remaining() == 0 {
                self.sync_scratch();
            }
        } else {
            self.off += n;
        }
    }

    fn pull(&mut self, min: usize) -> Result<bool> {
        if self.scratch.active() {
            if self.scratch.remaining() >= min {
                return Ok(true);
            }
            self.sync_scratch();
        }
        self.normalize();
        if self.seg_len() - self.off >= min {
            return Ok(true);
        }
        let logical = self.base + self.off as u64;
        let total_remaining = self.chain.len() as u64 - logical;
        if total_remaining < min as u64 {
            return Ok(false);
        }
        // scratch-спасение: собрать min..SCRATCH_TARGET байтов через сегменты
        let want = (total_remaining as usize).min(min.max(SCRATCH_TARGET));
        let mut collected = Vec::with_capacity(want);
        let (mut seg, mut off) = (self.seg, self.off);
        while collected.len() < want {
            let s = &self.chain.segments()[seg];
            let take = (s.len() - off).min(want - collected.len());
            collected.extend_from_slice(&s[off..off + take]);
            off += take;
            if off == s.len() {
                seg += 1;
                off = 0;
            }
        }
        self.scratch.activate(&collected, logical);
        Ok(true)
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.chain.len() as u64 {
            return Err(Status::out_of_range(format!(
                "seek position {} exceeds chain size {}",
                pos,
                self.chain.len()
            ))
            .into());
        }
        self.sync_scratch();
        self.reposition(pos);
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        Ok(self.chain.len() as u64)
    }
}
