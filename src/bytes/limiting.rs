//! limiting — писатель с жёстким пределом размера.
//!
//! Инвариант: pos() никогда не превышает size_limit; попытка выйти за
//! предел — RESOURCE_EXHAUSTED (а не молчаливое усечение).

use anyhow::Result;

use crate::bytes::writer::{FlushKind, Writer};
use crate::chain::Chain;
use crate::dep::Dep;
use crate::error::{ObjectState, Status};

pub struct LimitingWriter<'a, W: Writer> {
    dest: Dep<'a, W>,
    size_limit: u64,
    state: ObjectState,
}

impl<'a, W: Writer> LimitingWriter<'a, W> {
    pub fn new(dest: impl Into<Dep<'a, W>>, size_limit: u64) -> Self {
        Self {
            dest: dest.into(),
            size_limit,
            state: ObjectState::open(),
        }
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    fn check(&mut self, extra: u64) -> Result<()> {
        let pos = self.dest.get().pos();
        if pos + extra > self.size_limit {
            let err = Status::resource_exhausted(format!(
                "size limit exceeded: {} > {}",
                pos + extra,
                self.size_limit
            ))
            .into();
            return Err(self.state.fail(err));
        }
        Ok(())
    }

    /// Вернуть нижний писатель (для Owned-зависимости).
    pub fn into_dest(self) -> W {
        self.dest.into_owned()
    }
}

impl<'a, W: Writer> Writer for LimitingWriter<'a, W> {
    fn pos(&self) -> u64 {
        self.dest.get().pos()
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.state.ensure_healthy()?;
        self.check(min as u64)?;
        self.dest.get_mut().push(min)
    }

    fn available(&self) -> usize {
        let room = self.size_limit.saturating_sub(self.dest.get().pos());
        (self.dest.get().available() as u64).min(room) as usize
    }

    fn buffer(&mut self) -> &mut [u8] {
        let n = self.available();
        &mut self.dest.get_mut().buffer()[..n]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.dest.get_mut().advance(n);
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.state.ensure_healthy()?;
        self.check(src.len() as u64)?;
        self.dest.get_mut().write(src)
    }

    fn write_chain(&mut self, src: &Chain) -> Result<()> {
        self.state.ensure_healthy()?;
        self.check(src.len() as u64)?;
        self.dest.get_mut().write_chain(src)
    }

    fn write_zeros(&mut self, n: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        self.check(n)?;
        self.dest.get_mut().write_zeros(n)
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()?;
        self.dest.get_mut().flush(kind)
    }

    fn healthy(&self) -> bool {
        self.state.healthy() && self.dest.get().healthy()
    }

    fn status(&self) -> Option<Status> {
        self.state.status().or_else(|| self.dest.get().status())
    }

    fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state.close();
            if self.dest.is_owned() {
                return self.dest.get_mut().close();
            }
        }
        Ok(())
    }
}
