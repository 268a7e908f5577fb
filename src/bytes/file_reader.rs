//! file_reader — буферизованное чтение файла.
//!
//! Конкретный помощник для источника, умеющего только «перелить байты во
//! внешний массив» (std::fs::File). Держит кучу-буфер размера
//! Options::buffer_size; большие чтения идут мимо буфера (read-through,
//! порог == размер буфера).

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::bytes::reader::Reader;
use crate::config;
use crate::error::{ObjectState, Status};

#[derive(Debug, Clone)]
pub struct FileReaderOptions {
    pub buffer_size: usize,
}

impl Default for FileReaderOptions {
    fn default() -> Self {
        Self {
            buffer_size: config::global().buffer_size,
        }
    }
}

impl FileReaderOptions {
    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }
}

pub struct FileReader {
    file: File,
    path: PathBuf,
    buf: Vec<u8>,
    cursor: usize,
    limit: usize,
    buf_start_pos: u64, // позиция файла, соответствующая buf[0]
    state: ObjectState,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>, options: FileReaderOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .with_context(|| format!("open {}", path.display()))?;
        Ok(Self {
            file,
            path,
            buf: vec![0; options.buffer_size.max(1)],
            cursor: 0,
            limit: 0,
            buf_start_pos: 0,
            state: ObjectState::open(),
        })
    }

    /// Сдвинуть непотреблённый хвост окна в начало буфера.
    fn compact(&mut self) {
        if self.cursor > 0 {
            self.buf.copy_within(self.cursor..self.limit, 0);
            self.buf_start_pos += self.cursor as u64;
            self.limit -= self.cursor;
            self.cursor = 0;
        }
    }

    fn fill(&mut self, min: usize) -> Result<bool> {
        self.compact();
        if self.buf.len() < min {
            self.buf.resize(min, 0);
        }
        while self.limit < min {
            let n = self
                .file
                .read(&mut self.buf[self.limit..])
                .with_context(|| format!("reading {}", self.path.display()))?;
            if n == 0 {
                return Ok(false);
            }
            self.limit += n;
        }
        Ok(true)
    }
}

impl Reader for FileReader {
    fn pos(&self) -> u64 {
        self.buf_start_pos + self.cursor as u64
    }

    fn available(&self) -> usize {
        self.limit - self.cursor
    }

    fn peek(&self) -> &[u8] {
        &self.buf[self.cursor..self.limit]
    }

    fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
    }

    fn pull(&mut self, min: usize) -> Result<bool> {
        self.state.ensure_healthy()?;
        if self.available() >= min {
            return Ok(true);
        }
        let need = min - self.available();
        let have = self.available();
        match self.fill(have + need) {
            Ok(ok) => Ok(ok),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    /// Большие чтения идут мимо буфера.
    fn read(&mut self, n: usize, dst: &mut Vec<u8>) -> Result<bool> {
        self.state.ensure_healthy()?;
        dst.clear();
        dst.reserve(n);
        let take = self.available().min(n);
        dst.extend_from_slice(&self.peek()[..take]);
        self.consume(take);
        let mut remaining = n - take;
        if remaining == 0 {
            return Ok(true);
        }
        if remaining < self.buf.len() {
            if !self.pull(remaining)? {
                // всё, что осталось
                let tail = self.available();
                dst.extend_from_slice(&self.peek()[..tail]);
                self.consume(tail);
                return Ok(false);
            }
            dst.extend_from_slice(&self.peek()[..remaining]);
            self.consume(remaining);
            return Ok(true);
        }
        // read-through: окно пусто, читаем напрямую
        let read_pos = self.pos();
        self.buf_start_pos = read_pos;
        self.cursor = 0;
        self.limit = 0;
        let start = dst.len();
        dst.resize(start + remaining, 0);
        let mut filled = 0;
        while filled < remaining {
            let got = self
                .file
                .read(&mut dst[start + filled..])
                .with_context(|| format!("reading {}", self.path.display()));
            let got = match got {
                Ok(g) => g,
                Err(e) => return Err(self.state.fail(e)),
            };
            if got == 0 {
                dst.truncate(start + filled);
                self.buf_start_pos = read_pos + filled as u64;
                return Ok(false);
            }
            filled += got;
        }
        self.buf_start_pos = read_pos + remaining as u64;
        Ok(true)
    }

    fn supports_seek(&self) -> bool {
        true
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        // попадание в окно — без обращения к файлу
        if pos >= self.buf_start_pos && pos <= self.buf_start_pos + self.limit as u64 {
            self.cursor = (pos - self.buf_start_pos) as usize;
            return Ok(());
        }
        let r = self
            .file
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek in {}", self.path.display()));
        if let Err(e) = r {
            return Err(self.state.fail(e));
        }
        self.buf_start_pos = pos;
        self.cursor = 0;
        self.limit = 0;
        Ok(())
    }

    fn size(&mut self) -> Result<u64> {
        self.state.ensure_healthy()?;
        let md = self
            .file
            .metadata()
            .with_context(|| format!("stat {}", self.path.display()));
        match md {
            Ok(md) => Ok(md.len()),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    fn sync(&mut self) -> Result<()> {
        self.state.ensure_healthy()?;
        let pos = self.pos();
        let r = self
            .file
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek in {}", self.path.display()));
        if let Err(e) = r {
            return Err(self.state.fail(e));
        }
        self.buf_start_pos = pos;
        self.cursor = 0;
        self.limit = 0;
        Ok(())
    }

    fn healthy(&self) -> bool {
        self.state.healthy()
    }

    fn status(&self) -> Option<Status> {
        self.state.status()
    }

    fn close(&mut self) -> Result<()> {
        self.state.close();
        Ok(())
    }
}
