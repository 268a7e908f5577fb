//! digesting — прозрачный тройник: все байты проходят через дайджестер.
//!
//! Писатель/читатель неотличимы от нижнего, кроме дополнительного digest().
//! Прямой путь через buffer()/advance() тоже учитывается: байты
//! скармливаются дайджестеру в момент advance/consume.

use anyhow::Result;

use crate::bytes::reader::Reader;
use crate::bytes::writer::{FlushKind, Writer};
use crate::dep::Dep;
use crate::error::Status;
use crate::hash::Digester;

pub struct DigestingWriter<'a, W: Writer, D: Digester> {
    dest: Dep<'a, W>,
    digester: D,
}

impl<'a, W: Writer, D: Digester> DigestingWriter<'a, W, D> {
    pub fn new(dest: impl Into<Dep<'a, W>>, digester: D) -> Self {
        Self {
            dest: dest.into(),
            digester,
        }
    }

    pub fn digest(&self) -> D::Output {
        self.digester.digest()
    }

    pub fn into_dest(self) -> W {
        self.dest.into_owned()
    }
}

impl<'a, W: Writer, D: Digester> Writer for DigestingWriter<'a, W, D> {
    fn pos(&self) -> u64 {
        self.dest.get().pos()
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.dest.get_mut().push(min)
    }

    fn available(&self) -> usize {
        self.dest.get().available()
    }

    fn buffer(&mut self) -> &mut [u8] {
        self.dest.get_mut().buffer()
    }

    fn advance(&mut self, n: usize) {
        let dest = self.dest.get_mut();
        self.digester.update(&dest.buffer()[..n]);
        dest.advance(n);
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.digester.update(src);
        self.dest.get_mut().write(src)
    }

    fn write_zeros(&mut self, n: u64) -> Result<()> {
        let zeros = [0u8; 256];
        let mut rest = n;
        while rest > 0 {
            let take = rest.min(zeros.len() as u64) as usize;
            self.digester.update(&zeros[..take]);
            rest -= take as u64;
        }
        self.dest.get_mut().write_zeros(n)
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.dest.get_mut().flush(kind)
    }

    fn healthy(&self) -> bool {
        self.dest.get().healthy()
    }

    fn status(&self) -> Option<Status> {
        self.dest.get().status()
    }

    fn close(&mut self) -> Result<()> {
        if self.dest.is_owned() {
            self.dest.get_mut().close()
        } else {
            Ok(())
        }
    }
}

pub struct DigestingReader<'a, R: Reader, D: Digester> {
    src: Dep<'a, R>,
    digester: D,
}

impl<'a, R: Reader, D: Digester> DigestingReader<'a, R, D> {
    pub fn new(src: impl Into<Dep<'a, R>>, digester: D) -> Self {
        Self {
            src: src.into(),
            digester,
        }
    }

    pub fn digest(&self) -> D::Output {
        self.digester.digest()
    }
}

impl<'a, R: Reader, D: Digester> Reader for DigestingReader<'a, R, D> {
    fn pos(&self) -> u64 {
        self.src.get().pos()
    }

    fn available(&self) -> usize {
        self.src.get().available()
    }

    fn peek(&self) -> &[u8] {
        self.src.get().peek()
    }

    fn consume(&mut self, n: usize) {
        let src = self.src.get_mut();
        self.digester.update(&src.peek()[..n]);
        src.consume(n);
    }

    fn pull(&mut self, min: usize) -> Result<bool> {
        self.src.get_mut().pull(min)
    }

    fn healthy(&self) -> bool {
        self.src.get().healthy()
    }

    fn status(&self) -> Option<Status> {
        self.src.get().status()
    }

    fn close(&mut self) -> Result<()> {
        if self.src.is_owned() {
            self.src.get_mut().close()
        } else {
            Ok(())
        }
    }
}
