//! Centralized configuration for Sheaf.
//!
//! Goals:
//! - Single place for tunables instead of scattering env lookups.
//! - SheafConfig::from_env() reads SHEAF_* variables; builder-style overrides
//!   on top of it.
//! - Per-object Options structs take their defaults from the cached global().

use std::fmt;
use std::sync::OnceLock;

use crate::consts::{
    DEFAULT_BUCKET_FRACTION, DEFAULT_BUFFER_SIZE, DEFAULT_CHUNK_SIZE,
};

/// Top-level configuration (writer/reader defaults).
#[derive(Clone, Debug)]
pub struct SheafConfig {
    /// Buffer size for file-backed streams, bytes.
    /// Env: SHEAF_BUFFER_SIZE (default 65536)
    pub buffer_size: usize,

    /// Target uncompressed chunk size, bytes.
    /// Env: SHEAF_CHUNK_SIZE (default 1048576)
    pub chunk_size: u64,

    /// Target bucket size as a fraction of chunk size (transposed chunks).
    /// Env: SHEAF_BUCKET_FRACTION (default 0.125)
    pub bucket_fraction: f64,

    /// zstd compression level.
    /// Env: SHEAF_ZSTD_LEVEL (default 9)
    pub zstd_level: i32,

    /// brotli quality, 0..=11.
    /// Env: SHEAF_BROTLI_QUALITY (default 6)
    pub brotli_quality: u32,

    /// Pad to a block boundary on flush.
    /// Env: SHEAF_PAD_TO_BLOCK (default false; "1|true|on|yes" => true)
    pub pad_to_block_boundary: bool,
}

impl Default for SheafConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            bucket_fraction: DEFAULT_BUCKET_FRACTION,
            zstd_level: 9,
            brotli_quality: 6,
            pad_to_block_boundary: false,
        }
    }
}

fn env_bool(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    let s = v.trim().to_ascii_lowercase();
    Some(s == "1" || s == "true" || s == "on" || s == "yes")
}

impl SheafConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("SHEAF_BUFFER_SIZE") {
            if let Ok(n) = v.trim().parse::<usize>() {
                if n > 0 {
                    cfg.buffer_size = n;
                }
            }
        }

        if let Ok(v) = std::env::var("SHEAF_CHUNK_SIZE") {
            if let Ok(n) = v.trim().parse::<u64>() {
                if n > 0 {
                    cfg.chunk_size = n;
                }
            }
        }

        if let Ok(v) = std::env::var("SHEAF_BUCKET_FRACTION") {
            if let Ok(f) = v.trim().parse::<f64>() {
                if f > 0.0 && f <= 1.0 {
                    cfg.bucket_fraction = f;
                }
            }
        }

        if let Ok(v) = std::env::var("SHEAF_ZSTD_LEVEL") {
            if let Ok(n) = v.trim().parse::<i32>() {
                cfg.zstd_level = n.clamp(-32, 22);
            }
        }

        if let Ok(v) = std::env::var("SHEAF_BROTLI_QUALITY") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.brotli_quality = n.min(11);
            }
        }

        if let Some(on) = env_bool("SHEAF_PAD_TO_BLOCK") {
            cfg.pad_to_block_boundary = on;
        }

        cfg
    }

    /// Fluent setters (builder-style) to override specific fields.

    pub fn with_buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n;
        self
    }

    pub fn with_chunk_size(mut self, n: u64) -> Self {
        self.chunk_size = n;
        self
    }

    pub fn with_bucket_fraction(mut self, f: f64) -> Self {
        self.bucket_fraction = f;
        self
    }

    pub fn with_zstd_level(mut self, level: i32) -> Self {
        self.zstd_level = level;
        self
    }

    pub fn with_brotli_quality(mut self, q: u32) -> Self {
        self.brotli_quality = q;
        self
    }

    pub fn with_pad_to_block_boundary(mut self, on: bool) -> Self {
        self.pad_to_block_boundary = on;
        self
    }
}

impl fmt::Display for SheafConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SheafConfig {{ buffer_size: {}, chunk_size: {}, bucket_fraction: {}, \
             zstd_level: {}, brotli_quality: {}, pad_to_block_boundary: {} }}",
            self.buffer_size,
            self.chunk_size,
            self.bucket_fraction,
            self.zstd_level,
            self.brotli_quality,
            self.pad_to_block_boundary,
        )
    }
}

/// Конфигурация процесса (читается из ENV один раз).
pub fn global() -> &'static SheafConfig {
    static CONFIG: OnceLock<SheafConfig> = OnceLock::new();
    CONFIG.get_or_init(SheafConfig::from_env)
}
