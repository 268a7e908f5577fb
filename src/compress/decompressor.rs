//! decompressor — чтение встроенного сжатого потока.
//!
//! Источник — либо собственный буфер, либо заимствованный Reader (остаток
//! полезной нагрузки чанка). Для кодека != None сначала читается varint
//! несжатого размера. Результат сам является Reader-ом; brotli/zstd
//! распаковываются потоково, snappy (сырой формат) — целиком.

use anyhow::{Context, Result};
use std::io::Read as IoRead;

use crate::bytes::reader::Reader;
use crate::compress::CompressionType;
use crate::error::{ObjectState, Status};
use crate::varint::{parse_varint64, read_varint64};

/// Несжатый размер встроенного потока по его байтам.
/// None-кодек: равен длине; иначе — varint в начале. Ошибка разбора — None.
pub fn uncompressed_size_of(data: &[u8], compression: CompressionType) -> Option<u64> {
    match compression {
        CompressionType::None => Some(data.len() as u64),
        _ => parse_varint64(data).map(|(v, _)| v),
    }
}

/// Мост: наш Reader как std::io::Read.
struct ReaderToIo<'a> {
    src: &'a mut dyn Reader,
}

impl<'a> IoRead for ReaderToIo<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.src.available() == 0 {
            match self.src.pull(1) {
                Ok(true) => {}
                Ok(false) => return Ok(0),
                Err(e) => return Err(std::io::Error::new(std::io::ErrorKind::Other, format!("{:#}", e))),
            }
        }
        let n = self.src.available().min(buf.len());
        buf[..n].copy_from_slice(&self.src.peek()[..n]);
        self.src.consume(n);
        Ok(n)
    }
}

enum Input<'a> {
    Owned(std::io::Cursor<Vec<u8>>),
    Stream(ReaderToIo<'a>),
}

impl<'a> IoRead for Input<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Input::Owned(c) => c.read(buf),
            Input::Stream(s) => s.read(buf),
        }
    }
}

enum Codec<'a> {
    Raw(Input<'a>),
    Brotli(Box<brotli::Decompressor<Input<'a>>>),
    Zstd(zstd::stream::read::Decoder<'static, std::io::BufReader<Input<'a>>>),
    /// Сырой snappy не потоковый: распакован целиком при создании.
    Snappy(std::io::Cursor<Vec<u8>>),
}

impl<'a> IoRead for Codec<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Codec::Raw(r) => r.read(buf),
            Codec::Brotli(r) => r.read(buf),
            Codec::Zstd(r) => r.read(buf),
            Codec::Snappy(r) => r.read(buf),
        }
    }
}

const DECOMPRESS_BUFFER: usize = 8 * 1024;

pub struct Decompressor<'a> {
    codec: Codec<'a>,
    buf: Vec<u8>,
    cursor: usize,
    limit: usize,
    pos: u64,
    state: ObjectState,
}

impl Decompressor<'static> {
    /// Поток из собственного буфера сжатых байтов.
    pub fn from_vec(data: Vec<u8>, compression: CompressionType) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);
        if compression != CompressionType::None {
            let data = cursor.get_ref();
            let (_, n) = parse_varint64(data)
                .ok_or_else(|| Status::invalid_argument("reading uncompressed size failed"))?;
            cursor.set_position(n as u64);
        }
        Self::build(Input::Owned(cursor), compression)
    }
}

impl<'a> Decompressor<'a> {
    /// Поток из заимствованного Reader-а (читает его до конца).
    pub fn from_reader(src: &'a mut dyn Reader, compression: CompressionType) -> Result<Self> {
        if compression != CompressionType::None && read_varint64(&mut *src)?.is_none() {
            return Err(Status::invalid_argument("reading uncompressed size failed").into());
        }
        Self::build(Input::Stream(ReaderToIo { src }), compression)
    }

    fn build(input: Input<'a>, compression: CompressionType) -> Result<Decompressor<'a>> {
        let codec = match compression {
            CompressionType::None => Codec::Raw(input),
            CompressionType::Brotli => {
                Codec::Brotli(Box::new(brotli::Decompressor::new(input, 4096)))
            }
            CompressionType::Zstd => Codec::Zstd(
                zstd::stream::read::Decoder::new(input).context("create zstd decoder")?,
            ),
            CompressionType::Snappy => {
                let mut input = input;
                let mut compressed = Vec::new();
                input
                    .read_to_end(&mut compressed)
                    .context("reading snappy stream")?;
                let decompressed = snap::raw::Decoder::new()
                    .decompress_vec(&compressed)
                    .context("snappy decompression")?;
                Codec::Snappy(std::io::Cursor::new(decompressed))
            }
        };
        Ok(Decompressor {
            codec,
            buf: Vec::new(),
            cursor: 0,
            limit: 0,
            pos: 0,
            state: ObjectState::open(),
        })
    }
}

impl<'a> Reader for Decompressor<'a> {
    fn pos(&self) -> u64 {
        self.pos
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
        self.pos += n as u64;
    }

    fn pull(&mut self, min: usize) -> Result<bool> {
        self.state.ensure_healthy()?;
        if self.available() >= min {
            return Ok(true);
        }
        // сдвиг хвоста + дочитка
        if self.cursor > 0 {
            self.buf.copy_within(self.cursor..self.limit, 0);
            self.limit -= self.cursor;
            self.cursor = 0;
        }
        if self.buf.len() < min.max(DECOMPRESS_BUFFER) {
            self.buf.resize(min.max(DECOMPRESS_BUFFER), 0);
        }
        while self.limit < min {
            let n = match self.codec.read(&mut self.buf[self.limit..]) {
                Ok(n) => n,
                Err(e) => {
                    let err = Status::invalid_argument(format!("decompression failed: {}", e));
                    return Err(self.state.fail(err.into()));
                }
            };
            if n == 0 {
                return Ok(false);
            }
            self.limit += n;
        }
        Ok(true)
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
