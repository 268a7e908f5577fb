//! chain_writer — писатель в верёвку (Chain).
//!
//! Данные копятся в хвостовом сегменте ограниченного размера. push(min) с
//! min больше предельного сегмента обслуживается scratch-буфером
//! (см. bytes/pushable.rs): окно указывает в scratch, а при следующем
//! меняющем состояние вызове содержимое нарезается в сегменты.

use anyhow::Result;

use crate::bytes::pushable::WriteScratch;
use crate::bytes::writer::{FlushKind, Writer};
use crate::chain::{Chain, MAX_SEGMENT_SIZE, MIN_SEGMENT_SIZE};
use crate::dep::Dep;
use crate::error::{ObjectState, Status};

pub struct ChainWriter<'a> {
    dest: Dep<'a, Chain>,
    seg: Vec<u8>,    // текущий сегмент (len == вместимость окна)
    cursor: usize,   // записано в seg
    base: u64,       // байтов уже уехало в dest
    next_seg_size: usize,
    scratch: WriteScratch,
    state: ObjectState,
}

impl<'a> ChainWriter<'a> {
    pub fn new(dest: impl Into<Dep<'a, Chain>>) -> Self {
        let dest = dest.into();
        let base = dest.get().len() as u64;
        Self {
            dest,
            seg: Vec::new(),
            cursor: 0,
            base,
            next_seg_size: MIN_SEGMENT_SIZE,
            scratch: WriteScratch::new(),
            state: ObjectState::open(),
        }
    }

    /// Отдать накопленную верёвку (только для Owned-назначения).
    pub fn into_chain(mut self) -> Result<Chain> {
        self.flush(FlushKind::FromObject)?;
        Ok(std::mem::take(self.dest.get_mut()))
    }

    /// Закрыть текущий сегмент в dest.
    fn flush_seg(&mut self) {
        if self.cursor > 0 {
            let mut seg = std::mem::take(&mut self.seg);
            seg.truncate(self.cursor);
            self.base += seg.len() as u64;
            self.dest.get_mut().push_segment(seg);
            self.cursor = 0;
        } else {
            self.seg.clear();
        }
    }

    /// Выгрузить scratch в dest, нарезая на предельные сегменты.
    fn sync_scratch(&mut self) {
        if !self.scratch.active() {
            return;
        }
        let data = self.scratch.deactivate();
        self.flush_seg();
        for piece in data.chunks(MAX_SEGMENT_SIZE) {
            self.base += piece.len() as u64;
            self.dest.get_mut().push_segment(piece.to_vec());
        }
    }
}

impl<'a> Writer for ChainWriter<'a> {
    fn pos(&self) -> u64 {
        let scratch_part = if self.scratch.active() {
            self.scratch.written() as u64
        } else {
            0
        };
        self.base + self.cursor as u64 + scratch_part
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.scratch.active() {
            self.sync_scratch();
        }
        if self.seg.len() - self.cursor >= min {
            return Ok(());
        }
        self.flush_seg();
        if min <= MAX_SEGMENT_SIZE {
            let size = self.next_seg_size.max(min).min(MAX_SEGMENT_SIZE);
            self.next_seg_size = (self.next_seg_size * 2).min(MAX_SEGMENT_SIZE);
            self.seg = vec![0; size];
        } else {
            // запрошено окно больше предельного сегмента
            self.scratch.activate(min);
        }
        Ok(())
    }

    fn available(&self) -> usize {
        if self.scratch.active() {
            self.scratch.available()
        } else {
            self.seg.len() - self.cursor
        }
    }

    fn buffer(&mut self) -> &mut [u8] {
        if self.scratch.active() {
            self.scratch.window()
        } else {
            &mut self.seg[self.cursor..]
        }
    }

    fn advance(&mut self, n: usize) {
        if self.scratch.active() {
            self.scratch.advance(n);
        } else {
            debug_assert!(n <= self.seg.len() - self.cursor);
            self.cursor += n;
        }
    }

    fn write_chain(&mut self, src: &Chain) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.scratch.active() {
            self.sync_scratch();
        }
        // готовые сегменты уходят в dest как есть
        self.flush_seg();
        for seg in src.segments() {
            self.base += seg.len() as u64;
            self.dest.get_mut().push_segment(seg.clone());
        }
        Ok(())
    }

    fn flush(&mut self, _kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()?;
        self.sync_scratch();
        self.flush_seg();
        Ok(())
    }

    fn healthy(&self) -> bool {
        self.state.healthy()
    }

    fn status(&self) -> Option<Status> {
        self.state.status()
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.sync_scratch();
            self.flush_seg();
            self.state.close();
        }
        Ok(())
    }
}
