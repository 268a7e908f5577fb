//! Lightweight global metrics for Sheaf.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Chunk writer (чанки, паддинг, байты)
//! - Chunk reader (чанки, несовпадения хэшей)
//! - Recovery (восстановления, пропущенные байты)
//! - Compression (байты до/после сжатия)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Chunk writer -----
static CHUNKS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static PADDING_CHUNKS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static CHUNK_BYTES_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ----- Chunk reader -----
static CHUNKS_READ: AtomicU64 = AtomicU64::new(0);
static HEADER_HASH_MISMATCHES: AtomicU64 = AtomicU64::new(0);
static DATA_HASH_MISMATCHES: AtomicU64 = AtomicU64::new(0);

// ----- Recovery -----
static RECOVERIES: AtomicU64 = AtomicU64::new(0);
static SKIPPED_BYTES: AtomicU64 = AtomicU64::new(0);

// ----- Compression -----
static COMPRESS_BYTES_IN: AtomicU64 = AtomicU64::new(0);
static COMPRESS_BYTES_OUT: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub chunks_written: u64,
    pub padding_chunks_written: u64,
    pub chunk_bytes_written: u64,

    pub chunks_read: u64,
    pub header_hash_mismatches: u64,
    pub data_hash_mismatches: u64,

    pub recoveries: u64,
    pub skipped_bytes: u64,

    pub compress_bytes_in: u64,
    pub compress_bytes_out: u64,
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        chunks_written: CHUNKS_WRITTEN.load(Ordering::Relaxed),
        padding_chunks_written: PADDING_CHUNKS_WRITTEN.load(Ordering::Relaxed),
        chunk_bytes_written: CHUNK_BYTES_WRITTEN.load(Ordering::Relaxed),
        chunks_read: CHUNKS_READ.load(Ordering::Relaxed),
        header_hash_mismatches: HEADER_HASH_MISMATCHES.load(Ordering::Relaxed),
        data_hash_mismatches: DATA_HASH_MISMATCHES.load(Ordering::Relaxed),
        recoveries: RECOVERIES.load(Ordering::Relaxed),
        skipped_bytes: SKIPPED_BYTES.load(Ordering::Relaxed),
        compress_bytes_in: COMPRESS_BYTES_IN.load(Ordering::Relaxed),
        compress_bytes_out: COMPRESS_BYTES_OUT.load(Ordering::Relaxed),
    }
}

#[inline]
pub fn record_chunk_written(total_len: u64, padding: bool) {
    CHUNKS_WRITTEN.fetch_add(1, Ordering::Relaxed);
    CHUNK_BYTES_WRITTEN.fetch_add(total_len, Ordering::Relaxed);
    if padding {
        PADDING_CHUNKS_WRITTEN.fetch_add(1, Ordering::Relaxed);
    }
}

#[inline]
pub fn record_chunk_read() {
    CHUNKS_READ.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn record_header_hash_mismatch() {
    HEADER_HASH_MISMATCHES.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn record_data_hash_mismatch() {
    DATA_HASH_MISMATCHES.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub fn record_recovery(skipped: u64) {
    RECOVERIES.fetch_add(1, Ordering::Relaxed);
    SKIPPED_BYTES.fetch_add(skipped, Ordering::Relaxed);
}

#[inline]
pub fn record_compress(bytes_in: u64, bytes_out: u64) {
    COMPRESS_BYTES_IN.fetch_add(bytes_in, Ordering::Relaxed);
    COMPRESS_BYTES_OUT.fetch_add(bytes_out, Ordering::Relaxed);
}
