//! splitting — нарезка потока на шарды фиксированного размера.
//!
//! При достижении предела текущий нижний приёмник закрывается и фабрика
//! открывает следующий (нумерованные файлы на диске). Шарды всегда
//! принадлежат писателю и закрываются транзитивно.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::bytes::file_writer::{FileWriter, FileWriterOptions};
use crate::bytes::writer::{FlushKind, Writer};
use crate::error::{ObjectState, Status};

pub struct SplittingWriter<W: Writer, F: FnMut(usize) -> Result<W>> {
    open_shard: F,
    current: Option<W>,
    shard_index: usize,
    shard_size_limit: u64,
    base_pos: u64, // байтов в уже закрытых шардах
    state: ObjectState,
}

impl<W: Writer, F: FnMut(usize) -> Result<W>> SplittingWriter<W, F> {
    pub fn new(shard_size_limit: u64, open_shard: F) -> Self {
        assert!(shard_size_limit > 0, "shard size limit must be > 0");
        Self {
            open_shard,
            current: None,
            shard_index: 0,
            shard_size_limit,
            base_pos: 0,
            state: ObjectState::open(),
        }
    }

    /// Количество открытых шардов (включая текущий).
    pub fn shard_count(&self) -> usize {
        self.shard_index
    }

    fn shard(&mut self) -> Result<&mut W> {
        if self.current.is_none() {
            let w = (self.open_shard)(self.shard_index)?;
            self.shard_index += 1;
            self.current = Some(w);
        }
        Ok(self.current.as_mut().unwrap())
    }

    /// Сколько влезает в текущий шард.
    fn shard_room(&self) -> u64 {
        match &self.current {
            Some(w) => self.shard_size_limit.saturating_sub(w.pos()),
            None => self.shard_size_limit,
        }
    }

    fn roll_if_full(&mut self) -> Result<()> {
        if self.shard_room() == 0 {
            if let Some(mut w) = self.current.take() {
                self.base_pos += w.pos();
                w.close()?;
            }
        }
        Ok(())
    }
}

impl<W: Writer, F: FnMut(usize) -> Result<W>> Writer for SplittingWriter<W, F> {
    fn pos(&self) -> u64 {
        self.base_pos + self.current.as_ref().map(|w| w.pos()).unwrap_or(0)
    }

    fn push(&mut self, min: usize) -> Result<()> {
        self.state.ensure_healthy()?;
        self.roll_if_full()?;
        let room = self.shard_room();
        if (min as u64) > room {
            // окно не может пересекать границу шарда
            return Err(self.state.fail(
                Status::resource_exhausted(format!(
                    "contiguous window of {} bytes does not fit in shard ({} left)",
                    min, room
                ))
                .into(),
            ));
        }
        self.shard()?.push(min)
    }

    fn available(&self) -> usize {
        match &self.current {
            Some(w) => (w.available() as u64).min(self.shard_room()) as usize,
            None => 0,
        }
    }

    fn buffer(&mut self) -> &mut [u8] {
        let n = self.available();
        match self.current.as_mut() {
            Some(w) => &mut w.buffer()[..n],
            None => &mut [],
        }
    }

    fn advance(&mut self, n: usize) {
        if let Some(w) = self.current.as_mut() {
            w.advance(n);
        }
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.state.ensure_healthy()?;
        let mut rest = src;
        while !rest.is_empty() {
            self.roll_if_full()?;
            let room = self.shard_room();
            let take = (rest.len() as u64).min(room) as usize;
            let r = self.shard()?.write(&rest[..take]);
            if let Err(e) = r {
                return Err(self.state.fail(e));
            }
            rest = &rest[take..];
        }
        Ok(())
    }

    fn flush(&mut self, kind: FlushKind) -> Result<()> {
        self.state.ensure_healthy()?;
        if let Some(w) = self.current.as_mut() {
            w.flush(kind)?;
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
            self.state.close();
            if let Some(mut w) = self.current.take() {
                self.base_pos += w.pos();
                w.close()?;
            }
        }
        Ok(())
    }
}

/// Нумерованные файлы-шарды: `{prefix}-{:05}.{ext}` в каталоге dir.
pub fn numbered_file_shards(
    dir: impl AsRef<Path>,
    prefix: &str,
    ext: &str,
    options: FileWriterOptions,
) -> impl FnMut(usize) -> Result<FileWriter> {
    let dir: PathBuf = dir.as_ref().to_path_buf();
    let prefix = prefix.to_string();
    let ext = ext.to_string();
    move |index| {
        let name = format!("{}-{:05}.{}", prefix, index + 1, ext);
        FileWriter::create(dir.join(name), options.clone())
    }
}
