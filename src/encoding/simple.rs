//! simple — чанк из подряд идущих записей.
//!
//! Нагрузка: [байт сжатия][varint длины потока размеров]
//! [сжатый поток размеров (varint на запись)][сжатый поток значений].

use anyhow::Result;

use crate::bytes::bytes_reader::BytesReader;
use crate::bytes::reader::Reader;
use crate::chain::Chain;
use crate::chunk::{Chunk, ChunkType};
use crate::compress::{Compressor, CompressorOptions, Decompressor};
use crate::compress::CompressionType;
use crate::encoding::ChunkEncoder;
use crate::error::Status;
use crate::varint::{read_varint64, write_varint64};

pub struct SimpleEncoder {
    options: CompressorOptions,
    sizes: Vec<u8>,
    values: Compressor,
    num_records: u64,
    decoded_data_size: u64,
}

impl SimpleEncoder {
    pub fn new(options: CompressorOptions) -> Self {
        // final_size относится к единственному потоку, не к потокам чанка
        let options = options.with_final_size(None);
        let values = Compressor::new(options.clone());
        Self {
            options,
            sizes: Vec::new(),
            values,
            num_records: 0,
            decoded_data_size: 0,
        }
    }
}

impl ChunkEncoder for SimpleEncoder {
    fn add_record(&mut self, record: &[u8]) -> Result<()> {
        write_varint64(&mut self.sizes, record.len() as u64);
        self.values.write(record);
        self.num_records += 1;
        self.decoded_data_size += record.len() as u64;
        Ok(())
    }

    fn add_record_chain(&mut self, record: &Chain) -> Result<()> {
        write_varint64(&mut self.sizes, record.len() as u64);
        for seg in record.segments() {
            self.values.write(seg);
        }
        self.num_records += 1;
        self.decoded_data_size += record.len() as u64;
        Ok(())
    }

    fn num_records(&self) -> u64 {
        self.num_records
    }

    fn decoded_data_size(&self) -> u64 {
        self.decoded_data_size
    }

    fn encode(&mut self) -> Result<Chunk> {
        let mut payload = Vec::new();
        payload.push(self.options.compression.as_byte());
        let mut sizes_compressor = Compressor::new(self.options.clone());
        sizes_compressor.write(&self.sizes);
        let sizes_stream = sizes_compressor.finish()?;
        write_varint64(&mut payload, sizes_stream.len() as u64);
        payload.extend_from_slice(&sizes_stream);
        payload.extend_from_slice(&self.values.finish()?);
        let chunk = Chunk::new(
            ChunkType::Simple,
            payload,
            self.num_records,
            self.decoded_data_size,
        )?;
        self.clear();
        Ok(chunk)
    }

    fn clear(&mut self) {
        self.sizes.clear();
        self.values.clear();
        self.num_records = 0;
        self.decoded_data_size = 0;
    }
}

/// Развернуть нагрузку simple-чанка в (значения, границы записей).
pub fn decode(
    payload: &[u8],
    num_records: u64,
    decoded_data_size: u64,
) -> Result<(Vec<u8>, Vec<usize>)> {
    let mut src = BytesReader::new(payload);
    let compression_byte = src
        .read_byte()?
        .ok_or_else(|| Status::invalid_argument("reading compression type failed"))?;
    let compression = CompressionType::from_byte(compression_byte).ok_or_else(|| {
        Status::invalid_argument(format!("unknown compression type: 0x{:02x}", compression_byte))
    })?;

    let sizes_size = read_varint64(&mut src)?
        .ok_or_else(|| Status::invalid_argument("reading size of sizes failed"))?;
    let mut sizes_stream = Vec::new();
    if !src.read(sizes_size as usize, &mut sizes_stream)? {
        return Err(Status::invalid_argument("reading sizes stream failed").into());
    }

    let mut limits = Vec::with_capacity(num_records as usize);
    {
        let mut sizes = Decompressor::from_vec(sizes_stream, compression)?;
        let mut limit: u64 = 0;
        while (limits.len() as u64) < num_records {
            let size = read_varint64(&mut sizes)?
                .ok_or_else(|| Status::invalid_argument("reading record size failed"))?;
            if size > decoded_data_size - limit {
                return Err(Status::invalid_argument(
                    "decoded data size larger than expected",
                )
                .into());
            }
            limit += size;
            limits.push(limit as usize);
        }
        sizes.verify_end()?;
        if limit != decoded_data_size {
            return Err(Status::invalid_argument(
                "decoded data size smaller than expected",
            )
            .into());
        }
    }

    let mut values_decompressor = Decompressor::from_reader(&mut src, compression)?;
    let mut values = Vec::new();
    if !values_decompressor.read(decoded_data_size as usize, &mut values)? {
        return Err(Status::invalid_argument("reading record values failed").into());
    }
    values_decompressor.verify_end()?;
    Ok((values, limits))
}
