//! reader — чтение чанков: проверка хэшей, seek по выравниванию, recovery.
//!
//! Поиск заголовка без внешнего индекса: кандидаты проверяются хэшем
//! заголовка (XXH64 по 32 байтам), сканирование ограничено одним блоком за
//! шаг. Ложное срабатывание требует коллизии 64-битного хэша.

use anyhow::Result;

use crate::bytes::reader::Reader;
use crate::chunk::header::{ChunkHeader, ChunkType};
use crate::chunk::{
    chunk_end, is_possible_chunk_boundary, next_possible_boundary, Chunk, SkippedRegion,
};
use crate::consts::{BLOCK_SIZE, CHUNK_HEADER_SIZE};
use crate::dep::Dep;
use crate::error::{ObjectState, Status};
use crate::hash::hash_bytes;
use crate::metrics::{
    record_chunk_read, record_data_hash_mismatch, record_header_hash_mismatch, record_recovery,
};

use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recoverable {
    No,
    /// Позиция следующего чанка известна (заголовок был валиден).
    HaveChunk(u64),
    /// Искать следующий правдоподобный заголовок сканированием.
    FindChunk(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WhichChunk {
    Containing,
    Before,
    After,
}

pub struct ChunkReader<'a, R: Reader> {
    src: Dep<'a, R>,
    pos: u64,
    header: Option<ChunkHeader>,
    recoverable: Recoverable,
    state: ObjectState,
}

impl<'a, R: Reader> ChunkReader<'a, R> {
    /// Читать чанки с текущей позиции src. Недопустимая позиция фиксируется
    /// как сбой с возможностью recover().
    pub fn new(src: impl Into<Dep<'a, R>>) -> Self {
        let src = src.into();
        let pos = src.get().pos();
        let mut reader = Self {
            src,
            pos,
            header: None,
            recoverable: Recoverable::No,
            state: ObjectState::open(),
        };
        if !is_possible_chunk_boundary(pos) {
            reader.recoverable = Recoverable::FindChunk(pos);
            let _ = reader
                .state
                .fail(Status::invalid_argument(format!("invalid chunk boundary: {}", pos)).into());
        }
        reader
    }

    /// Позиция текущего (следующего читаемого) чанка.
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Option<Status> {
        self.state.status()
    }

    pub fn size(&mut self) -> Result<u64> {
        self.state.ensure_healthy()?;
        self.src.get_mut().size()
    }

    pub fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state.close();
            if self.src.is_owned() {
                return self.src.get_mut().close();
            }
        }
        Ok(())
    }

    /// Проверить сигнатуру файла (первый чанк).
    pub fn check_file_format(&mut self) -> Result<bool> {
        Ok(self.pull_chunk_header()?.is_some())
    }

    /// Подсмотреть заголовок текущего чанка, не читая нагрузку.
    /// Ok(None) — чистый конец файла.
    pub fn pull_chunk_header(&mut self) -> Result<Option<ChunkHeader>> {
        self.state.ensure_healthy()?;
        if let Some(h) = self.header {
            return Ok(Some(h));
        }
        match self.read_header_impl() {
            Ok(r) => Ok(r),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    fn read_header_impl(&mut self) -> Result<Option<ChunkHeader>> {
        let pos = self.pos;
        let src = self.src.get_mut();
        if src.pos() != pos {
            src.seek(pos)?;
        }
        if !src.pull(1)? {
            return Ok(None);
        }
        let mut bytes = [0u8; CHUNK_HEADER_SIZE as usize];
        if !src.read_slice(&mut bytes)? {
            self.recoverable = Recoverable::FindChunk(pos + 1);
            return Err(Status::data_loss(format!(
                "truncated file: incomplete chunk header at {}",
                pos
            ))
            .into());
        }
        let header = ChunkHeader::from_bytes(bytes);
        let computed = header.computed_header_hash();
        if computed != header.stored_header_hash() {
            record_header_hash_mismatch();
            self.recoverable = Recoverable::FindChunk(pos + 1);
            return Err(Status::data_loss(format!(
                "chunk header hash mismatch (computed 0x{:016x}, stored 0x{:016x}), chunk at {}",
                computed,
                header.stored_header_hash(),
                pos
            ))
            .into());
        }
        if pos == 0
            && (header.data_size() != 0
                || header.chunk_type() != Some(ChunkType::FileSignature)
                || header.num_records() != 0
                || header.decoded_data_size() != 0)
        {
            self.recoverable = Recoverable::FindChunk(CHUNK_HEADER_SIZE);
            return Err(Status::invalid_argument("invalid file: missing file signature").into());
        }
        self.header = Some(header);
        Ok(Some(header))
    }

    /// Прочитать текущий чанк целиком. Ok(None) — чистый конец файла.
    pub fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        let header = match self.pull_chunk_header()? {
            Some(h) => h,
            None => return Ok(None),
        };
        match self.read_chunk_impl(header) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    fn read_chunk_impl(&mut self, header: ChunkHeader) -> Result<Chunk> {
        let begin = self.pos;
        let end = chunk_end(&header, begin);
        let data_size = header.data_size() as usize;
        let src = self.src.get_mut();
        let mut data = Vec::new();
        if !src.read(data_size, &mut data)? {
            self.recoverable = Recoverable::FindChunk(src.pos());
            return Err(Status::data_loss(format!(
                "truncated file: incomplete chunk at {} with length {}/{}",
                begin,
                data.len(),
                data_size
            ))
            .into());
        }
        let computed = hash_bytes(&data);
        if computed != header.data_hash() {
            record_data_hash_mismatch();
            // заголовок валиден, позиция следующего чанка заслуживает доверия
            self.recoverable = Recoverable::HaveChunk(end);
            return Err(Status::data_loss(format!(
                "chunk data hash mismatch (computed 0x{:016x}, stored 0x{:016x}), chunk at {} with length {}",
                computed,
                header.data_hash(),
                begin,
                end - begin
            ))
            .into());
        }
        // нулевой хвост блока; обрыв на хвосте не мешает дочитать файл
        let fill = end - (begin + CHUNK_HEADER_SIZE + data_size as u64);
        if fill > 0 {
            let _ = src.skip(fill)?;
        }
        self.pos = end;
        self.header = None;
        record_chunk_read();
        Ok(Chunk { header, data })
    }

    /// Перейти на известную границу чанка.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.pos == pos {
            return Ok(());
        }
        self.header = None;
        self.pos = pos;
        if !is_possible_chunk_boundary(pos) {
            self.recoverable = Recoverable::FindChunk(pos);
            return Err(self
                .state
                .fail(Status::invalid_argument(format!("invalid chunk boundary: {}", pos)).into()));
        }
        Ok(())
    }

    pub fn seek_to_chunk_containing(&mut self, pos: u64) -> Result<()> {
        self.seek_to_chunk(pos, WhichChunk::Containing)
    }

    pub fn seek_to_chunk_before(&mut self, pos: u64) -> Result<()> {
        self.seek_to_chunk(pos, WhichChunk::Before)
    }

    pub fn seek_to_chunk_after(&mut self, pos: u64) -> Result<()> {
        self.seek_to_chunk(pos, WhichChunk::After)
    }

    fn seek_to_chunk(&mut self, target: u64, which: WhichChunk) -> Result<()> {
        self.state.ensure_healthy()?;
        if self.pos == target {
            return Ok(());
        }
        if self.pos < target && target - self.pos <= BLOCK_SIZE {
            // близкая цель: шагать по цепочке заголовков от текущего чанка
            let begin = self.pos;
            return self.walk_to_chunk(begin, target, which);
        }
        // дальняя цель: искать заголовок в блоке цели, при неудаче — левее
        let mut block_begin = target - target % BLOCK_SIZE;
        loop {
            let found = match self.find_header_in_block(block_begin, block_begin) {
                Ok(f) => f,
                Err(e) => return Err(self.state.fail(e)),
            };
            match found {
                Some(h) if h <= target || block_begin == 0 || which == WhichChunk::After => {
                    return self.walk_to_chunk(h, target, which);
                }
                _ => {
                    if block_begin == 0 {
                        self.recoverable = Recoverable::FindChunk(target);
                        return Err(self.state.fail(
                            Status::data_loss(format!(
                                "no valid chunk header found before {}",
                                target
                            ))
                            .into(),
                        ));
                    }
                    block_begin -= BLOCK_SIZE;
                }
            }
        }
    }

    fn walk_to_chunk(&mut self, mut begin: u64, target: u64, which: WhichChunk) -> Result<()> {
        loop {
            if self.pos != begin {
                self.pos = begin;
                self.header = None;
            }
            if begin >= target {
                return Ok(());
            }
            let header = match self.pull_chunk_header()? {
                Some(h) => h,
                None => {
                    // конец файла раньше цели
                    self.recoverable = Recoverable::FindChunk(self.pos);
                    return Err(self.state.fail(
                        Status::out_of_range(format!(
                            "position {} exceeds file size: {}",
                            target, self.pos
                        ))
                        .into(),
                    ));
                }
            };
            // числовые позиции записей: chunk_begin + record_index
            if which == WhichChunk::Containing && begin + header.num_records() > target {
                return Ok(());
            }
            let end = chunk_end(&header, begin);
            if which == WhichChunk::Before && end > target {
                return Ok(());
            }
            begin = end;
        }
    }

    /// Первый валидный заголовок в блоке, начиная с min_pos.
    fn find_header_in_block(&mut self, block_begin: u64, min_pos: u64) -> Result<Option<u64>> {
        let size = self.src.get_mut().size()?;
        if block_begin >= size {
            return Ok(None);
        }
        let src = self.src.get_mut();
        src.seek(block_begin)?;
        let want = BLOCK_SIZE.min(size - block_begin) as usize;
        let mut buf = Vec::new();
        let _ = src.read(want, &mut buf)?;
        let last_fit = (BLOCK_SIZE - CHUNK_HEADER_SIZE) as usize;
        let from = min_pos.saturating_sub(block_begin) as usize;
        let hdr = CHUNK_HEADER_SIZE as usize;
        if buf.len() < hdr {
            return Ok(None);
        }
        for off in from..=buf.len() - hdr {
            if off > last_fit {
                break;
            }
            let window = &buf[off..off + hdr];
            let stored = LittleEndian::read_u64(&window[0..8]);
            if stored == hash_bytes(&window[8..]) {
                return Ok(Some(block_begin + off as u64));
            }
        }
        Ok(None)
    }

    /// Сканировать вперёд от from до первого правдоподобного заголовка.
    /// Ok(None) — до конца файла заголовков нет.
    fn find_chunk_from(&mut self, from: u64) -> Result<Option<u64>> {
        let size = self.src.get_mut().size()?;
        let mut scan_from = from;
        loop {
            let block_begin = scan_from - scan_from % BLOCK_SIZE;
            if block_begin >= size {
                return Ok(None);
            }
            if let Some(h) = self.find_header_in_block(block_begin, scan_from)? {
                return Ok(Some(h));
            }
            scan_from = block_begin + BLOCK_SIZE;
        }
    }

    /// Применить отложенное восстановление: перескочить повреждённый
    /// диапазон к следующему правдоподобному чанку.
    /// Ok(None) — восстанавливать нечего.
    pub fn recover(&mut self) -> Result<Option<SkippedRegion>> {
        if self.recoverable == Recoverable::No {
            return Ok(None);
        }
        let region_begin = self.pos;
        let message = self
            .state
            .status()
            .map(|s| s.message)
            .unwrap_or_default();
        self.state.mark_not_failed();
        self.header = None;
        let recoverable = std::mem::replace(&mut self.recoverable, Recoverable::No);
        let new_pos = match recoverable {
            Recoverable::No => unreachable!(),
            Recoverable::HaveChunk(p) => {
                if is_possible_chunk_boundary(p) {
                    p
                } else {
                    match self.find_chunk_from(next_possible_boundary(p)) {
                        Ok(Some(h)) => h,
                        Ok(None) => self.src.get_mut().size()?,
                        Err(e) => return Err(self.state.fail(e)),
                    }
                }
            }
            Recoverable::FindChunk(p) => match self.find_chunk_from(p) {
                Ok(Some(h)) => h,
                Ok(None) => self.src.get_mut().size()?,
                Err(e) => return Err(self.state.fail(e)),
            },
        };
        self.pos = new_pos;
        record_recovery(new_pos.saturating_sub(region_begin));
        log::debug!(
            "recovered: skipped [{}..{}): {}",
            region_begin,
            new_pos,
            message
        );
        Ok(Some(SkippedRegion::new(region_begin, new_pos, message)))
    }
}
