use Sheaf::SheafConfig;

#[test]
fn defaults_are_sane() {
    let cfg = SheafConfig::default();
    assert_eq!(cfg.buffer_size, 64 * 1024);
    assert_eq!(cfg.chunk_size, 1 << 20);
    assert!((cfg.bucket_fraction - 0.125).abs() < 1e-9);
    assert_eq!(cfg.zstd_level, 9);
    assert_eq!(cfg.brotli_quality, 6);
    assert!(!cfg.pad_to_block_boundary);
}

#[test]
fn builder_overrides() {
    let cfg = SheafConfig::default()
        .with_buffer_size(1024)
        .with_chunk_size(4096)
        .with_bucket_fraction(0.25)
        .with_zstd_level(3)
        .with_brotli_quality(11)
        .with_pad_to_block_boundary(true);
    assert_eq!(cfg.buffer_size, 1024);
    assert_eq!(cfg.chunk_size, 4096);
    assert!((cfg.bucket_fraction - 0.25).abs() < 1e-9);
    assert_eq!(cfg.zstd_level, 3);
    assert_eq!(cfg.brotli_quality, 11);
    assert!(cfg.pad_to_block_boundary);
}

#[test]
fn display_lists_all_fields() {
    let text = SheafConfig::default().to_string();
    assert!(text.contains("buffer_size"));
    assert!(text.contains("chunk_size"));
    assert!(text.contains("bucket_fraction"));
    assert!(text.contains("zstd_level"));
    assert!(text.contains("brotli_quality"));
    assert!(text.contains("pad_to_block_boundary"));
}

#[test]
fn env_parsing_ignores_garbage() {
    // мусорные значения не меняют дефолтов
    std::env::set_var("SHEAF_CHUNK_SIZE", "not-a-number");
    std::env::set_var("SHEAF_BUCKET_FRACTION", "42.0");
    let cfg = SheafConfig::from_env();
    assert_eq!(cfg.chunk_size, 1 << 20);
    assert!((cfg.bucket_fraction - 0.125).abs() < 1e-9);
    std::env::remove_var("SHEAF_CHUNK_SIZE");
    std::env::remove_var("SHEAF_BUCKET_FRACTION");
}
