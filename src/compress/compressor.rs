//! compressor — запись встроенного сжатого потока.
//!
//! Данные копятся несжатыми; finish() отдаёт готовый поток:
//! [varint несжатого размера][байты кодека] (для None — сырые байты).
//! zstd со стандартными параметрами идёт через пул контекстов; отступления
//! (window_log/checksum/final_size) — через потоковый энкодер.

use anyhow::{Context, Result};
use std::io::Write as IoWrite;

use crate::compress::pool;
use crate::compress::{CompressionType, CompressorOptions};
use crate::error::Status;
use crate::metrics::record_compress;
use crate::varint::write_varint64;

pub struct Compressor {
    options: CompressorOptions,
    raw: Vec<u8>,
}

impl Compressor {
    pub fn new(options: CompressorOptions) -> Self {
        let mut raw = Vec::new();
        if let Some(hint) = options.size_hint {
            raw.reserve(hint.min(1 << 22) as usize);
        }
        Self { options, raw }
    }

    pub fn compression(&self) -> CompressionType {
        self.options.compression
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.raw.extend_from_slice(bytes);
    }

    pub fn write_varint64(&mut self, value: u64) {
        write_varint64(&mut self.raw, value);
    }

    pub fn uncompressed_size(&self) -> u64 {
        self.raw.len() as u64
    }

    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Завершить поток и вернуть его байты. Компрессор очищается.
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        if let Some(final_size) = self.options.final_size {
            // заявленный точный размер обязателен к исполнению
            if final_size != self.raw.len() as u64 {
                return Err(Status::invalid_argument(format!(
                    "actual size does not match pledged final size: {} != {}",
                    self.raw.len(),
                    final_size
                ))
                .into());
            }
        }
        let raw = std::mem::take(&mut self.raw);
        let out = match self.options.compression {
            CompressionType::None => raw,
            CompressionType::Zstd => {
                let mut out = Vec::with_capacity(raw.len() / 2 + 64);
                write_varint64(&mut out, raw.len() as u64);
                let compressed = self.zstd_compress(&raw)?;
                out.extend_from_slice(&compressed);
                record_compress(raw.len() as u64, compressed.len() as u64);
                out
            }
            CompressionType::Brotli => {
                let mut out = Vec::with_capacity(raw.len() / 2 + 64);
                write_varint64(&mut out, raw.len() as u64);
                let compressed = self.brotli_compress(&raw)?;
                out.extend_from_slice(&compressed);
                record_compress(raw.len() as u64, compressed.len() as u64);
                out
            }
            CompressionType::Snappy => {
                let mut out = Vec::with_capacity(raw.len() / 2 + 64);
                write_varint64(&mut out, raw.len() as u64);
                let compressed = snap::raw::Encoder::new()
                    .compress_vec(&raw)
                    .context("snappy compression")?;
                out.extend_from_slice(&compressed);
                record_compress(raw.len() as u64, compressed.len() as u64);
                out
            }
        };
        Ok(out)
    }

    fn zstd_default_params(&self) -> bool {
        self.options.zstd_window_log < 0
            && !self.options.store_checksum
            && self.options.final_size.is_none()
    }

    fn zstd_compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let level = self.options.zstd_level;
        if self.zstd_default_params() {
            let mut ctx = pool::take_zstd(level)?;
            let out = ctx.compress(raw).context("zstd compression")?;
            pool::give_zstd(level, ctx);
            return Ok(out);
        }
        let mut encoder = zstd::stream::write::Encoder::new(
            Vec::with_capacity(raw.len() / 2 + 64),
            level,
        )
        .context("create zstd encoder")?;
        if self.options.zstd_window_log >= 0 {
            let log = self.options.zstd_window_log.clamp(10, 31) as u32;
            encoder.window_log(log).context("zstd window log")?;
        }
        if self.options.store_checksum {
            encoder.include_checksum(true).context("zstd checksum")?;
        }
        if self.options.final_size.is_some() {
            encoder
                .set_pledged_src_size(Some(raw.len() as u64))
                .context("zstd pledged size")?;
        }
        encoder.write_all(raw).context("zstd compression")?;
        encoder.finish().context("zstd finish")
    }

    fn brotli_compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut params = brotli::enc::BrotliEncoderParams::default();
        params.quality = self.options.brotli_quality.min(11) as i32;
        params.lgwin = if self.options.brotli_window_log >= 0 {
            self.options.brotli_window_log.clamp(10, 24)
        } else {
            // авто: наименьшее окно, покрывающее данные
            let hint = self
                .options
                .size_hint
                .unwrap_or(raw.len() as u64)
                .max(raw.len() as u64)
                .max(1);
            let mut log = 10;
            while (1u64 << log) < hint && log < 22 {
                log += 1;
            }
            log
        };
        let mut out = Vec::with_capacity(raw.len() / 2 + 64);
        let mut src = std::io::Cursor::new(raw);
        brotli::BrotliCompress(&mut src, &mut out, &params).context("brotli compression")?;
        Ok(out)
    }
}
