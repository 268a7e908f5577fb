//! pool — переиспользование zstd-контекстов.
//!
//! Контекст сжатия дорог в создании; вместо освобождения он возвращается в
//! процесс-широкий пул, ключуемый уровнем сжатия. Нестандартные параметры
//! (window_log, checksum, pledged size) не пулируются — для них контекст
//! конфигурируется на месте потоковым энкодером.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use anyhow::{Context, Result};

/// Сколько контекстов держать на уровень.
const MAX_POOLED_PER_LEVEL: usize = 8;

fn pool() -> &'static Mutex<HashMap<i32, Vec<zstd::bulk::Compressor<'static>>>> {
    static POOL: OnceLock<Mutex<HashMap<i32, Vec<zstd::bulk::Compressor<'static>>>>> =
        OnceLock::new();
    POOL.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Взять контекст из пула (или создать новый).
pub(crate) fn take_zstd(level: i32) -> Result<zstd::bulk::Compressor<'static>> {
    if let Some(c) = pool()
        .lock()
        .unwrap()
        .get_mut(&level)
        .and_then(|v| v.pop())
    {
        return Ok(c);
    }
    zstd::bulk::Compressor::new(level).context("create zstd compression context")
}

/// Вернуть контекст в пул.
pub(crate) fn give_zstd(level: i32, compressor: zstd::bulk::Compressor<'static>) {
    let mut guard = pool().lock().unwrap();
    let slot = guard.entry(level).or_default();
    if slot.len() < MAX_POOLED_PER_LEVEL {
        slot.push(compressor);
    }
}
