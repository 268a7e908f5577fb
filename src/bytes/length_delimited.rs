//! length_delimited — кадрирование «varint-длина + нагрузка».

use anyhow::Result;

use crate::bytes::reader::Reader;
use crate::bytes::writer::Writer;
use crate::chain::Chain;
use crate::error::Status;
use crate::varint::{length_varint64, read_varint64, write_varint64, MAX_LEN_VARINT64};

/// Записать кадр: varint длины, затем байты.
pub fn write_length_delimited<W: Writer + ?Sized>(dest: &mut W, payload: &[u8]) -> Result<()> {
    let mut prefix = Vec::with_capacity(MAX_LEN_VARINT64);
    write_varint64(&mut prefix, payload.len() as u64);
    dest.write(&prefix)?;
    dest.write(payload)
}

/// Записать кадр из верёвки без линейной склейки.
pub fn write_length_delimited_chain<W: Writer + ?Sized>(
    dest: &mut W,
    payload: &Chain,
) -> Result<()> {
    let mut prefix = Vec::with_capacity(MAX_LEN_VARINT64);
    write_varint64(&mut prefix, payload.len() as u64);
    dest.write(&prefix)?;
    dest.write_chain(payload)
}

/// Размер кадра для нагрузки данной длины.
pub fn length_delimited_size(payload_len: u64) -> u64 {
    length_varint64(payload_len) as u64 + payload_len
}

/// Прочитать кадр. Ok(None) — чистый конец потока перед префиксом;
/// обрыв внутри кадра — ошибка.
pub fn read_length_delimited<R: Reader + ?Sized>(src: &mut R) -> Result<Option<Vec<u8>>> {
    if !src.pull(1)? {
        return Ok(None);
    }
    let length = read_varint64(&mut *src)?
        .ok_or_else(|| Status::invalid_argument("reading length prefix failed"))?;
    let mut payload = Vec::new();
    if !src.read(length as usize, &mut payload)? {
        return Err(Status::invalid_argument(format!(
            "truncated length-delimited frame at {}",
            src.pos()
        ))
        .into());
    }
    Ok(Some(payload))
}
