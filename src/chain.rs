//! chain — верёвка из плоских сегментов.
//!
//! Запись произвольного размера без линейного копирования: данные хранятся
//! как последовательность непрерывных сегментов. Writer/Reader-API обязаны
//! принимать Chain без склейки в один буфер (для больших записей).

use std::fmt;

/// Максимальный размер сегмента, создаваемого append_slice/ChainWriter.
pub const MAX_SEGMENT_SIZE: usize = 64 * 1024;

/// Стартовый размер хвостового сегмента при дозаписи.
pub const MIN_SEGMENT_SIZE: usize = 128;

#[derive(Clone, Default)]
pub struct Chain {
    segments: Vec<Vec<u8>>,
    len: usize,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        let segments = if data.is_empty() { vec![] } else { vec![data] };
        Self { segments, len }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Плоские сегменты в порядке данных. Пустых сегментов не бывает.
    pub fn segments(&self) -> &[Vec<u8>] {
        &self.segments
    }

    /// Добавить готовый сегмент (пустые игнорируются).
    pub fn push_segment(&mut self, segment: Vec<u8>) {
        if segment.is_empty() {
            return;
        }
        self.len += segment.len();
        self.segments.push(segment);
    }

    /// Дозаписать байты в хвостовой сегмент (с ограничением размера сегмента).
    pub fn append_slice(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let need_new = match self.segments.last() {
                Some(tail) => tail.len() >= MAX_SEGMENT_SIZE || tail.capacity() == tail.len(),
                None => true,
            };
            if need_new {
                let cap = bytes.len().clamp(MIN_SEGMENT_SIZE, MAX_SEGMENT_SIZE);
                self.segments.push(Vec::with_capacity(cap));
            }
            let tail = self.segments.last_mut().unwrap();
            let room = (MAX_SEGMENT_SIZE - tail.len()).min(tail.capacity() - tail.len());
            let take = bytes.len().min(room.max(1));
            tail.extend_from_slice(&bytes[..take]);
            self.len += take;
            bytes = &bytes[take..];
        }
    }

    pub fn append_chain(&mut self, other: Chain) {
        for seg in other.segments {
            self.push_segment(seg);
        }
    }

    /// Линейная копия содержимого.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len);
        for seg in &self.segments {
            out.extend_from_slice(seg);
        }
        out
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }
}

impl From<Vec<u8>> for Chain {
    fn from(data: Vec<u8>) -> Self {
        Chain::from_vec(data)
    }
}

impl From<&[u8]> for Chain {
    fn from(data: &[u8]) -> Self {
        Chain::from_vec(data.to_vec())
    }
}

impl PartialEq for Chain {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        // сравнение по содержимому, независимо от разбиения на сегменты
        let mut a = self.segments.iter().flat_map(|s| s.iter());
        let mut b = other.segments.iter().flat_map(|s| s.iter());
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if x == y => continue,
                _ => return false,
            }
        }
    }
}

impl Eq for Chain {}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chain {{ len: {}, segments: {} }}",
            self.len,
            self.segments.len()
        )
    }
}
