//! header — 40-байтовый заголовок чанка.
//!
//! Layout (little-endian):
//! [header_hash u64]      -- XXH64 по байтам [8..40)
//! [data_size u64]
//! [data_hash u64]        -- XXH64 полезной нагрузки
//! [num_records u64]
//! [decoded_data_size 7B]
//! [chunk_type u8]

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{
    CHUNK_HEADER_SIZE, CHUNK_OFF_CHUNK_TYPE, CHUNK_OFF_DATA_HASH, CHUNK_OFF_DATA_SIZE,
    CHUNK_OFF_DECODED_DATA_SIZE, CHUNK_OFF_HEADER_HASH, CHUNK_OFF_NUM_RECORDS,
    CHUNK_TYPE_FILE_METADATA, CHUNK_TYPE_FILE_SIGNATURE, CHUNK_TYPE_PADDING, CHUNK_TYPE_SIMPLE,
    CHUNK_TYPE_TRANSPOSED, MAX_DECODED_DATA_SIZE,
};
use crate::error::Status;
use crate::hash::hash_bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    FileSignature,
    FileMetadata,
    Padding,
    Simple,
    Transposed,
}

impl ChunkType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            CHUNK_TYPE_FILE_SIGNATURE => Some(Self::FileSignature),
            CHUNK_TYPE_FILE_METADATA => Some(Self::FileMetadata),
            CHUNK_TYPE_PADDING => Some(Self::Padding),
            CHUNK_TYPE_SIMPLE => Some(Self::Simple),
            CHUNK_TYPE_TRANSPOSED => Some(Self::Transposed),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::FileSignature => CHUNK_TYPE_FILE_SIGNATURE,
            Self::FileMetadata => CHUNK_TYPE_FILE_METADATA,
            Self::Padding => CHUNK_TYPE_PADDING,
            Self::Simple => CHUNK_TYPE_SIMPLE,
            Self::Transposed => CHUNK_TYPE_TRANSPOSED,
        }
    }
}

#[derive(Clone, Copy)]
pub struct ChunkHeader {
    bytes: [u8; CHUNK_HEADER_SIZE as usize],
}

impl ChunkHeader {
    /// Собрать заголовок для полезной нагрузки, вычислив оба хэша.
    pub fn new(
        data: &[u8],
        chunk_type: ChunkType,
        num_records: u64,
        decoded_data_size: u64,
    ) -> Result<Self> {
        if decoded_data_size > MAX_DECODED_DATA_SIZE {
            return Err(Status::resource_exhausted(format!(
                "decoded data size does not fit in 7 bytes: {}",
                decoded_data_size
            ))
            .into());
        }
        let mut bytes = [0u8; CHUNK_HEADER_SIZE as usize];
        LittleEndian::write_u64(
            &mut bytes[CHUNK_OFF_DATA_SIZE..CHUNK_OFF_DATA_SIZE + 8],
            data.len() as u64,
        );
        LittleEndian::write_u64(
            &mut bytes[CHUNK_OFF_DATA_HASH..CHUNK_OFF_DATA_HASH + 8],
            hash_bytes(data),
        );
        LittleEndian::write_u64(
            &mut bytes[CHUNK_OFF_NUM_RECORDS..CHUNK_OFF_NUM_RECORDS + 8],
            num_records,
        );
        // 7 младших байтов LE
        let mut size8 = [0u8; 8];
        LittleEndian::write_u64(&mut size8, decoded_data_size);
        bytes[CHUNK_OFF_DECODED_DATA_SIZE..CHUNK_OFF_DECODED_DATA_SIZE + 7]
            .copy_from_slice(&size8[..7]);
        bytes[CHUNK_OFF_CHUNK_TYPE] = chunk_type.as_u8();
        let header_hash = hash_bytes(&bytes[CHUNK_OFF_DATA_SIZE..]);
        LittleEndian::write_u64(
            &mut bytes[CHUNK_OFF_HEADER_HASH..CHUNK_OFF_HEADER_HASH + 8],
            header_hash,
        );
        Ok(Self { bytes })
    }

    /// Заголовок из сырых байтов (без проверки).
    pub fn from_bytes(bytes: [u8; CHUNK_HEADER_SIZE as usize]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8; CHUNK_HEADER_SIZE as usize] {
        &self.bytes
    }

    pub fn stored_header_hash(&self) -> u64 {
        LittleEndian::read_u64(&self.bytes[CHUNK_OFF_HEADER_HASH..CHUNK_OFF_HEADER_HASH + 8])
    }

    pub fn computed_header_hash(&self) -> u64 {
        hash_bytes(&self.bytes[CHUNK_OFF_DATA_SIZE..])
    }

    pub fn data_size(&self) -> u64 {
        LittleEndian::read_u64(&self.bytes[CHUNK_OFF_DATA_SIZE..CHUNK_OFF_DATA_SIZE + 8])
    }

    pub fn data_hash(&self) -> u64 {
        LittleEndian::read_u64(&self.bytes[CHUNK_OFF_DATA_HASH..CHUNK_OFF_DATA_HASH + 8])
    }

    pub fn num_records(&self) -> u64 {
        LittleEndian::read_u64(&self.bytes[CHUNK_OFF_NUM_RECORDS..CHUNK_OFF_NUM_RECORDS + 8])
    }

    pub fn decoded_data_size(&self) -> u64 {
        let mut size8 = [0u8; 8];
        size8[..7]
            .copy_from_slice(&self.bytes[CHUNK_OFF_DECODED_DATA_SIZE..CHUNK_OFF_DECODED_DATA_SIZE + 7]);
        LittleEndian::read_u64(&size8)
    }

    pub fn chunk_type_byte(&self) -> u8 {
        self.bytes[CHUNK_OFF_CHUNK_TYPE]
    }

    pub fn chunk_type(&self) -> Option<ChunkType> {
        ChunkType::from_u8(self.chunk_type_byte())
    }
}

impl std::fmt::Debug for ChunkHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ChunkHeader {{ type: 0x{:02x}, data_size: {}, num_records: {}, decoded_data_size: {} }}",
            self.chunk_type_byte(),
            self.data_size(),
            self.num_records(),
            self.decoded_data_size(),
        )
    }
}
