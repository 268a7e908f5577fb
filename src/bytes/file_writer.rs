//! file_writer — буферизованная запись в файл.
//!
//! Кучи-буфер размера Options::buffer_size; записи не меньше буфера идут
//! мимо него (write-through). flush(FromMachine) — sync_all().

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write as IoWrite};
use std::path::{Path, PathBuf};

use crate::bytes::writer::{FlushKind, Writer};
use crate::config;
use crate::error::{ObjectState, Status};

#[derive(Debug, Clone)]
pub struct FileWriterOptions {
    pub buffer_size: usize,
    /// Дописывать в конец существующего файла вместо усечения.
    pub append: bool,
}

impl Default for FileWriterOptions {
    fn default() -> Self {
        Self {
            buffer_size: config::global().buffer_size,
            append: false,
        }
    }
}

impl FileWriterOptions {
    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }

    pub fn with_append(mut self, on: bool) -> Self {
        self.append = on;
        self
    }
}

pub struct FileWriter {
    file: File,
    path: PathBuf,
    buf: Vec<u8>,
    cursor: usize, // записано в buf
    start_pos: u64, // позиция файла до буфера
    state: ObjectState,
}

impl FileWriter {
    pub fn create(path: impl AsRef<Path>, options: FileWriterOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut oo = OpenOptions::new();
        oo.write(true).create(true);
        if !options.append {
            oo.truncate(true);
        }
        let mut file = oo
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        let start_pos = if options.append {
            file.seek(SeekFrom::End(0))
                .with_context(|| format!("seek in {}", path.display()))?
        } else {
            0
        };
        Ok(Self {
            file,
            path,
            buf: vec![0; options.buffer_size.max(1)],
            cursor: 0,
            start_pos,
            state: ObjectState::open(),
        })
    }

    fn flush_buf(&mut self) -> Result<()> {
        if self.cursor > 0 {
            self.file
                .write_all(&self.buf[..self.cursor])
                .with_context(|| format!("writing {}", self.path.display()))?;
            self.start_pos += self.cursor as u64;
            self.cursor = 0;
        }
        Ok(())
    }
}

impl Writer for FileWriter {
    fn pos(&self) -> u64 {
        self.start_pos + self.cursor as u64
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.buf.len() - self.cursor >= min {
            return Ok(());
        }
        if let Err(e) = self.flush_buf() {
            return Err(self.state.fail(e));
        }
        if self.buf.len() < min {
            self.buf.resize(min, 0);
        }
        Ok(())
    }

    fn available(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn buffer(&mut self) -> &mut [u8] {
        &mut self.buf[self.cursor..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.state.ensure_healthy()?;
        if src.len() >= self.buf.len() {
            // write-through: большая запись идёт мимо буфера
            if let Err(e) = self.flush_buf() {
                return Err(self.state.fail(e));
            }
            let r = self
                .file
                .write_all(src)
                .with_context(|| format!("writing {}", self.path.display()));
            if let Err(e) = r {
                return Err(self.state.fail(e));
            }
            self.start_pos += src.len() as u64;
            return Ok(());
        }
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

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()?;
        if let Err(e) = self.flush_buf() {
            return Err(self.state.fail(e));
        }
        match kind {
            FlushKind::FromObject => Ok(()),
            FlushKind::FromProcess => {
                let r = self
                    .file
                    .flush()
                    .with_context(|| format!("flushing {}", self.path.display()));
                r.map_err(|e| self.state.fail(e))
            }
            FlushKind::FromMachine => {
                let r = self
                    .file
                    .sync_all()
                    .with_context(|| format!("fsync {}", self.path.display()));
                r.map_err(|e| self.state.fail(e))
            }
        }
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        if let Err(e) = self.flush_buf() {
            return Err(self.state.fail(e));
        }
        let r = self
            .file
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek in {}", self.path.display()));
        if let Err(e) = r {
            return Err(self.state.fail(e));
        }
        self.start_pos = pos;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        self.state.ensure_healthy()?;
        let md = self
            .file
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()));
        match md {
            Ok(md) => Ok(md.len().max(self.pos())),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    fn truncate(&mut self, size: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        if let Err(e) = self.flush_buf() {
            return Err(self.state.fail(e));
        }
        let r = self
            .file
            .set_len(size)
            .with_context(|| format!("truncate {}", self.path.display()));
        if let Err(e) = r {
            return Err(self.state.fail(e));
        }
        if self.start_pos > size {
            self.seek(size)?;
        }
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
            if self.state.healthy() {
                if let Err(e) = self.flush_buf() {
                    let e = self.state.fail(e);
                    self.state.close();
                    return Err(e);
                }
            }
            self.state.close();
        }
        Ok(())
    }
}
