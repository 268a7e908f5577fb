//! reader — чтение записей с восстановлением и поиском.
//!
//! Держит чанк-ридер и курсор (chunk_begin, record_index). Повреждения
//! пересказываются наружу через recovery-колбэк: вернул true — пропущенный
//! диапазон зафиксирован и чтение продолжается, false — чтение окончено.

use anyhow::Result;
use std::cmp::Ordering;

use crate::bytes::reader::Reader;
use crate::chunk::{ChunkReader, ChunkType, SkippedRegion};
use crate::dep::Dep;
use crate::encoding::projection::FieldProjection;
use crate::encoding::transpose;
use crate::encoding::ChunkDecoder;
use crate::error::{ObjectState, Status};
use crate::records::position::RecordPosition;

/// Решение recovery-колбэка: продолжать ли чтение после пропуска.
pub type RecoveryFn = Box<dyn FnMut(&SkippedRegion) -> bool>;

#[derive(Default)]
pub struct RecordReaderOptions {
    pub field_projection: FieldProjection,
    pub recovery: Option<RecoveryFn>,
}

impl RecordReaderOptions {
    pub fn with_field_projection(mut self, projection: FieldProjection) -> Self {
        self.field_projection = projection;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryFn) -> Self {
        self.recovery = Some(recovery);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recoverable {
    No,
    ChunkReader,
    ChunkDecoder,
}

enum Eval {
    Less { next: u64, index_after: u64, num_records: u64 },
    Equal { pos: RecordPosition },
    Greater { pos: RecordPosition },
    Unordered { next: u64 },
}

pub struct RecordReader<'a, R: Reader> {
    chunk_reader: ChunkReader<'a, R>,
    chunk_begin: u64,
    decoder: ChunkDecoder,
    recoverable: Recoverable,
    recovery: Option<RecoveryFn>,
    last_record_valid: bool,
    state: ObjectState,
}

impl<'a, R: Reader> RecordReader<'a, R> {
    pub fn new(src: impl Into<Dep<'a, R>>, options: RecordReaderOptions) -> Self {
        let chunk_reader = ChunkReader::new(src);
        let chunk_begin = chunk_reader.pos();
        Self {
            chunk_reader,
            chunk_begin,
            decoder: ChunkDecoder::new(options.field_projection),
            recoverable: Recoverable::No,
            recovery: options.recovery,
            last_record_valid: false,
            state: ObjectState::open(),
        }
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Option<Status> {
        self.state.status()
    }

    pub fn size(&mut self) -> Result<u64> {
        self.state.ensure_healthy()?;
        self.chunk_reader.size()
    }

    /// Позиция следующей записи (каноническая).
    pub fn pos(&self) -> RecordPosition {
        if self.decoder.index() < self.decoder.num_records() {
            RecordPosition::new(self.chunk_begin, self.decoder.index())
        } else {
            RecordPosition::new(self.chunk_reader.pos(), 0)
        }
    }

    /// Позиция последней прочитанной записи.
    pub fn last_pos(&self) -> Option<RecordPosition> {
        if self.last_record_valid && self.decoder.index() > 0 {
            Some(RecordPosition::new(
                self.chunk_begin,
                self.decoder.index() - 1,
            ))
        } else {
            None
        }
    }

    pub fn close(&mut self) -> Result<()> {
        if self.state.is_open() {
            self.state.close();
            return self.chunk_reader.close();
        }
        Ok(())
    }

    pub fn check_file_format(&mut self) -> Result<bool> {
        self.state.ensure_healthy()?;
        if self.decoder.num_records() > 0 {
            return Ok(true);
        }
        match self.chunk_reader.check_file_format() {
            Ok(ok) => {
                if !ok {
                    self.decoder.clear();
                }
                Ok(ok)
            }
            Err(e) => {
                self.recoverable = Recoverable::ChunkReader;
                Err(self.state.fail(e))
            }
        }
    }

    /// Сериализованные метаданные файла (metadata-чанк после сигнатуры).
    /// Ok(None) — чанка метаданных нет.
    pub fn read_metadata(&mut self) -> Result<Option<Vec<u8>>> {
        self.state.ensure_healthy()?;
        if self.chunk_reader.pos() != 0 {
            return Err(self.state.fail(
                Status::failed_precondition(
                    "read_metadata must be called at the beginning of the file",
                )
                .into(),
            ));
        }
        // сигнатурный чанк
        self.chunk_begin = 0;
        match self.chunk_reader.read_chunk() {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(None),
            Err(e) => {
                self.recoverable = Recoverable::ChunkReader;
                return Err(self.state.fail(e));
            }
        }
        self.chunk_begin = self.chunk_reader.pos();
        let header = match self.chunk_reader.pull_chunk_header() {
            Ok(Some(h)) => h,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.recoverable = Recoverable::ChunkReader;
                return Err(self.state.fail(e));
            }
        };
        if header.chunk_type() != Some(ChunkType::FileMetadata) {
            // чанка метаданных нет — считаем метаданные пустыми
            return Ok(None);
        }
        let chunk = match self.chunk_reader.read_chunk() {
            Ok(Some(c)) => c,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.recoverable = Recoverable::ChunkReader;
                return Err(self.state.fail(e));
            }
        };
        if chunk.header.num_records() != 0 {
            return Err(self.state.fail(
                Status::invalid_argument(format!(
                    "invalid file metadata chunk: number of records is not zero: {}",
                    chunk.header.num_records()
                ))
                .into(),
            ));
        }
        let decoded = transpose::decode::decode(
            &chunk.data,
            1,
            chunk.header.decoded_data_size(),
            &FieldProjection::all(),
        );
        match decoded {
            Ok((values, _limits)) => Ok(Some(values)),
            Err(e) => {
                self.recoverable = Recoverable::ChunkDecoder;
                Err(self.state.fail(e))
            }
        }
    }

    /// Следующая запись; Ok(None) — конец файла (или recovery-колбэк
    /// остановил чтение).
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>> {
        self.last_record_valid = false;
        loop {
            if !self.state.healthy() {
                // сбой с прошлого вызова: либо recovery, либо та же ошибка
                if !self.try_recovery()? {
                    if self.state.healthy() {
                        return Ok(None);
                    }
                    self.state.ensure_healthy()?;
                }
                continue;
            }
            if let Some(record) = self.decoder.read_record() {
                self.last_record_valid = true;
                return Ok(Some(record));
            }
            match self.read_next_chunk() {
                Ok(true) => continue,
                Ok(false) => return Ok(None),
                Err(e) => {
                    let err = self.state.fail(e);
                    if !self.try_recovery()? {
                        if self.state.healthy() {
                            // колбэк остановил чтение
                            return Ok(None);
                        }
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Прочитать и раскодировать следующий чанк. Ok(false) — конец файла.
    fn read_next_chunk(&mut self) -> Result<bool> {
        self.chunk_begin = self.chunk_reader.pos();
        let chunk = match self.chunk_reader.read_chunk() {
            Ok(Some(c)) => c,
            Ok(None) => {
                self.decoder.clear();
                self.chunk_begin = self.chunk_reader.pos();
                return Ok(false);
            }
            Err(e) => {
                self.decoder.clear();
                self.recoverable = Recoverable::ChunkReader;
                return Err(e);
            }
        };
        if let Err(e) = self.decoder.decode(&chunk) {
            self.recoverable = Recoverable::ChunkDecoder;
            return Err(e);
        }
        Ok(true)
    }

    /// Снять сбой через recovery-колбэк. Ok(true) — продолжать чтение.
    /// Ok(false) и healthy — колбэк остановил; Ok(false) и сбой — колбэка нет.
    fn try_recovery(&mut self) -> Result<bool> {
        if self.recovery.is_none() {
            return Ok(false);
        }
        let region = self.recover()?;
        match region {
            Some(region) => {
                let mut callback = self.recovery.take().unwrap();
                let go_on = callback(&region);
                self.recovery = Some(callback);
                Ok(go_on)
            }
            None => Ok(false),
        }
    }

    /// Применить отложенное восстановление; вернуть пропущенный диапазон.
    pub fn recover(&mut self) -> Result<Option<SkippedRegion>> {
        let kind = std::mem::replace(&mut self.recoverable, Recoverable::No);
        match kind {
            Recoverable::No => Ok(None),
            Recoverable::ChunkReader => {
                self.state.mark_not_failed();
                let region = self.chunk_reader.recover()?;
                self.chunk_begin = self.chunk_reader.pos();
                Ok(region)
            }
            Recoverable::ChunkDecoder => {
                let message = self
                    .state
                    .status()
                    .map(|s| s.message)
                    .unwrap_or_default();
                self.state.mark_not_failed();
                let begin = self.chunk_begin + self.decoder.index();
                let end = self.chunk_reader.pos();
                self.decoder.clear();
                self.chunk_begin = end;
                Ok(Some(SkippedRegion::new(begin, end, message)))
            }
        }
    }

    /// Сменить проекцию: текущий чанк перечитывается лениво с новым фильтром,
    /// позиция записи сохраняется.
    pub fn set_field_projection(&mut self, projection: FieldProjection) -> Result<()> {
        self.state.ensure_healthy()?;
        let index = self.decoder.index();
        self.decoder.set_projection(projection);
        if let Err(e) = self.chunk_reader.seek(self.chunk_begin) {
            self.recoverable = Recoverable::ChunkReader;
            return Err(self.state.fail(e));
        }
        if index > 0 {
            match self.read_next_chunk() {
                Ok(true) => self.decoder.set_index(index),
                Ok(false) => {}
                Err(e) => return Err(self.state.fail(e)),
            }
        }
        Ok(())
    }

    pub fn seek(&mut self, pos: RecordPosition) -> Result<()> {
        self.state.ensure_healthy()?;
        self.last_record_valid = false;
        if pos.chunk_begin() == self.chunk_begin {
            if pos.record_index() == 0 || self.chunk_reader.pos() > self.chunk_begin {
                // чанк уже прочитан, либо чтение не требуется: начало чанка
                // может вообще не существовать (конец файла)
                self.decoder.set_index(pos.record_index());
                return Ok(());
            }
        } else {
            if let Err(e) = self.chunk_reader.seek(pos.chunk_begin()) {
                self.recoverable = Recoverable::ChunkReader;
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                return Err(self.state.fail(e));
            }
            self.chunk_begin = pos.chunk_begin();
            if pos.record_index() == 0 {
                self.decoder.clear();
                return Ok(());
            }
        }
        match self.read_next_chunk() {
            Ok(true) => {
                self.decoder.set_index(pos.record_index());
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => Err(self.state.fail(e)),
        }
    }

    /// Seek по числовой позиции (байтовое смещение в файле).
    pub fn seek_numeric(&mut self, pos: u64) -> Result<()> {
        self.state.ensure_healthy()?;
        self.last_record_valid = false;
        if pos >= self.chunk_begin && pos <= self.chunk_reader.pos() {
            // внутри или сразу за текущим (прочитанным) чанком
        } else {
            if let Err(e) = self.chunk_reader.seek_to_chunk_containing(pos) {
                self.recoverable = Recoverable::ChunkReader;
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                return Err(self.state.fail(e));
            }
            if self.chunk_reader.pos() >= pos {
                // начало чанка; числовая позиция могла указывать за последнюю
                // запись предыдущего чанка
                self.chunk_begin = self.chunk_reader.pos();
                self.decoder.clear();
                return Ok(());
            }
            self.chunk_begin = self.chunk_reader.pos();
            match self.read_next_chunk() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(e) => return Err(self.state.fail(e)),
            }
        }
        self.decoder.set_index(pos - self.chunk_begin);
        Ok(())
    }

    /// Шаг на одну запись назад. Ok(false) — записей раньше нет.
    pub fn seek_back(&mut self) -> Result<bool> {
        self.state.ensure_healthy()?;
        self.last_record_valid = false;
        if self.decoder.index() > 0 {
            self.decoder.set_index(self.decoder.index() - 1);
            return Ok(true);
        }
        let mut chunk_pos = self.chunk_begin;
        while chunk_pos > 0 {
            if let Err(e) = self.chunk_reader.seek_to_chunk_before(chunk_pos - 1) {
                // при успешном восстановлении продолжаем поиск от начала
                // пропущенной области
                self.recoverable = Recoverable::ChunkReader;
                let err = self.state.fail(e);
                if !self.try_recovery()? {
                    if self.state.healthy() {
                        return Ok(false);
                    }
                    return Err(err);
                }
                chunk_pos = self.chunk_reader.pos();
                continue;
            }
            match self.read_next_chunk() {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => {
                    let err = self.state.fail(e);
                    if !self.try_recovery()? {
                        if self.state.healthy() {
                            return Ok(false);
                        }
                        return Err(err);
                    }
                    chunk_pos = self.chunk_reader.pos();
                    continue;
                }
            }
            if self.decoder.num_records() > 0 {
                self.decoder.set_index(self.decoder.num_records() - 1);
                return Ok(true);
            }
            // чанк без записей: продолжаем поиск от его начала
            chunk_pos = self.chunk_begin;
        }
        Ok(false)
    }

    /// Двоичный поиск по упорядоченному файлу. test вызывается на позиции
    /// очередной записи, читает её и сравнивает с целью; None — запись вне
    /// порядка (пропущена при сравнении).
    ///
    /// Ok(true) — позиция установлена на найденную запись (Equal) либо на
    /// первую «большую» позицию.
    pub fn search(
        &mut self,
        mut test: impl FnMut(&mut Self) -> Result<Option<Ordering>>,
    ) -> Result<bool> {
        self.state.ensure_healthy()?;
        self.last_record_valid = false;
        let size = self.size()?;
        let mut lo: u64 = 0;
        let mut hi: u64 = size;
        let mut greater = RecordPosition::new(size, 0);
        let mut less_found: Option<(u64, u64, u64)> = None; // (chunk, index_after, num)

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let probe = match self.search_middle(lo, hi, mid)? {
                Some(p) => p,
                None => break,
            };
            // вперёд по чанкам, пока сравнение не даст порядок
            let mut c = probe;
            let mut guide = None;
            while c < hi {
                match self.evaluate_chunk(c, &mut test)? {
                    Eval::Equal { pos } => {
                        self.seek(pos)?;
                        return Ok(true);
                    }
                    Eval::Less {
                        next,
                        index_after,
                        num_records,
                    } => {
                        guide = Some((Some((c, index_after, num_records)), next, None));
                        break;
                    }
                    Eval::Greater { pos } => {
                        guide = Some((None, 0, Some(pos)));
                        break;
                    }
                    Eval::Unordered { next } => {
                        if next <= c {
                            break;
                        }
                        c = next;
                    }
                }
            }
            match guide {
                Some((Some(suffix), next, _)) => {
                    less_found = Some(suffix);
                    lo = next;
                }
                Some((None, _, Some(pos))) => {
                    greater = pos;
                    hi = pos.chunk_begin();
                }
                _ => {
                    // всё от probe до hi вне порядка
                    if probe >= hi {
                        break;
                    }
                    hi = probe;
                }
            }
        }

        // уточнение внутри чанка, где встретилась «меньшая» запись
        let mut position = greater;
        if let Some((chunk, index_after, num_records)) = less_found {
            let mut lo_i = index_after;
            let mut hi_i = num_records;
            while lo_i < hi_i {
                let mid_i = lo_i + (hi_i - lo_i) / 2;
                let mut i = mid_i;
                let mut outcome = None;
                while i < hi_i {
                    self.seek(RecordPosition::new(chunk, i))?;
                    match test(self)? {
                        Some(ordering) => {
                            outcome = Some((ordering, i));
                            break;
                        }
                        None => i += 1,
                    }
                }
                match outcome {
                    None => hi_i = mid_i,
                    Some((Ordering::Less, i)) => lo_i = i + 1,
                    Some((Ordering::Equal, i)) => {
                        self.seek(RecordPosition::new(chunk, i))?;
                        return Ok(true);
                    }
                    Some((Ordering::Greater, _)) => hi_i = mid_i,
                }
            }
            if lo_i < num_records {
                position = RecordPosition::new(chunk, lo_i);
            }
        }
        self.seek(position)?;
        Ok(true)
    }

    /// Middle-примитив поиска: чанк перед серединой; если пропущенная
    /// область перекрыла правую границу — откат к seek(low).
    fn search_middle(&mut self, lo: u64, hi: u64, mid: u64) -> Result<Option<u64>> {
        match self.chunk_reader.seek_to_chunk_before(mid) {
            Ok(()) => Ok(Some(self.chunk_reader.pos())),
            Err(e) => {
                self.recoverable = Recoverable::ChunkReader;
                let err = self.state.fail(e);
                if !self.try_recovery()? {
                    if self.state.healthy() {
                        return Ok(None);
                    }
                    return Err(err);
                }
                if self.chunk_reader.pos() >= hi {
                    // пропуск ушёл за правую границу: берём следующий чанк от lo
                    match self.chunk_reader.seek(lo) {
                        Ok(()) => {}
                        Err(e) => {
                            self.recoverable = Recoverable::ChunkReader;
                            let err = self.state.fail(e);
                            if !self.try_recovery()? {
                                if self.state.healthy() {
                                    return Ok(None);
                                }
                                return Err(err);
                            }
                            if self.chunk_reader.pos() >= hi {
                                return Ok(None);
                            }
                        }
                    }
                }
                Ok(Some(self.chunk_reader.pos()))
            }
        }
    }

    /// Оценить чанк по позиции c: прогнать test по записям до первого
    /// упорядоченного ответа.
    fn evaluate_chunk(
        &mut self,
        c: u64,
        test: &mut impl FnMut(&mut Self) -> Result<Option<Ordering>>,
    ) -> Result<Eval> {
        if let Err(e) = self.chunk_reader.seek(c) {
            self.recoverable = Recoverable::ChunkReader;
            let err = self.state.fail(e);
            if !self.try_recovery()? {
                return Err(err);
            }
            return Ok(Eval::Unordered {
                next: self.chunk_reader.pos(),
            });
        }
        self.chunk_begin = c;
        match self.read_next_chunk() {
            Ok(true) => {}
            Ok(false) => {
                return Ok(Eval::Unordered {
                    next: self.chunk_reader.pos(),
                })
            }
            Err(e) => {
                let err = self.state.fail(e);
                if !self.try_recovery()? {
                    if self.state.healthy() {
                        return Ok(Eval::Unordered {
                            next: self.chunk_reader.pos(),
                        });
                    }
                    return Err(err);
                }
                return Ok(Eval::Unordered {
                    next: self.chunk_reader.pos(),
                });
            }
        }
        let chunk = self.chunk_begin;
        let num_records = self.decoder.num_records();
        for i in 0..num_records {
            self.decoder.set_index(i);
            match test(self)? {
                Some(Ordering::Less) => {
                    return Ok(Eval::Less {
                        next: self.chunk_reader.pos(),
                        index_after: i + 1,
                        num_records,
                    })
                }
                Some(Ordering::Equal) => {
                    return Ok(Eval::Equal {
                        pos: RecordPosition::new(chunk, i),
                    })
                }
                Some(Ordering::Greater) => {
                    return Ok(Eval::Greater {
                        pos: RecordPosition::new(chunk, i),
                    })
                }
                None => {}
            }
        }
        Ok(Eval::Unordered {
            next: self.chunk_reader.pos(),
        })
    }
}
