//! Общие константы контейнерного формата (блоки, заголовки чанков, байты сжатия).

// -------- Blocks --------

/// Размер блока выравнивания. Заголовок чанка никогда не пересекает границу блока.
pub const BLOCK_SIZE: u64 = 1 << 16;

// -------- Chunk header --------
//
// Формат заголовка чанка (40 байт, little-endian):
// [header_hash u64]        -- XXH64 по байтам [8..40)
// [data_size u64]          -- длина полезной нагрузки
// [data_hash u64]          -- XXH64 полезной нагрузки
// [num_records u64]        -- количество записей (0 для signature/metadata/padding)
// [decoded_data_size 7B]   -- ожидаемый размер декодированного потока записей
// [chunk_type u8]          -- CHUNK_TYPE_*
pub const CHUNK_HEADER_SIZE: u64 = 40;

// Offsets inside chunk header
pub const CHUNK_OFF_HEADER_HASH: usize = 0;
pub const CHUNK_OFF_DATA_SIZE: usize = 8;
pub const CHUNK_OFF_DATA_HASH: usize = 16;
pub const CHUNK_OFF_NUM_RECORDS: usize = 24;
pub const CHUNK_OFF_DECODED_DATA_SIZE: usize = 32;
pub const CHUNK_OFF_CHUNK_TYPE: usize = 39;

/// decoded_data_size хранится в 7 байтах: значения >= 2^56 не представимы.
pub const MAX_DECODED_DATA_SIZE: u64 = (1 << 56) - 1;

// Типы чанков
pub const CHUNK_TYPE_FILE_SIGNATURE: u8 = 0x73; // 's'
pub const CHUNK_TYPE_FILE_METADATA: u8 = 0x6d; // 'm'
pub const CHUNK_TYPE_PADDING: u8 = 0x70; // 'p'
pub const CHUNK_TYPE_SIMPLE: u8 = 0x72; // 'r'
pub const CHUNK_TYPE_TRANSPOSED: u8 = 0x74; // 't'

// -------- Compression byte --------
//
// Первый байт любого встроенного сжатого потока.
pub const COMPRESSION_NONE: u8 = 0;
pub const COMPRESSION_BROTLI: u8 = b'b';
pub const COMPRESSION_ZSTD: u8 = b'z';
pub const COMPRESSION_SNAPPY: u8 = b's';

// -------- Defaults --------

/// Порог размера чанка по умолчанию (несжатые данные записей).
pub const DEFAULT_CHUNK_SIZE: u64 = 1 << 20;

/// Размер буфера файловых потоков по умолчанию.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Целевая доля чанка на один бакет транспонированного кодека.
pub const DEFAULT_BUCKET_FRACTION: f64 = 1.0 / 8.0;
