use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use Sheaf::bytes::{
    FileReader, FileReaderOptions, FileWriter, FileWriterOptions, FlushKind, Reader, Writer,
};
use Sheaf::{RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions};

// ---------- helpers ----------

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir();
    base.join(format!("sheaftest-file-{prefix}-{pid}-{t}-{id}"))
}

// ---------- tests ----------

#[test]
fn records_roundtrip_through_files() {
    let root = unique_root("roundtrip");
    std::fs::create_dir_all(&root).expect("create root");
    let path = root.join("records.sheaf");

    let records: Vec<Vec<u8>> = (0..100)
        .map(|i| format!("payload-{:04}", i).into_bytes())
        .collect();
    {
        let dest = FileWriter::create(&path, FileWriterOptions::default()).expect("create");
        let options = RecordWriterOptions::default().with_chunk_size(256);
        let mut writer = RecordWriter::new(dest, options).expect("open writer");
        for rec in &records {
            writer.write_record(rec).expect("write");
        }
        writer.flush(FlushKind::FromMachine).expect("durable flush");
        writer.close().expect("close");
    }

    let src = FileReader::open(&path, FileReaderOptions::default()).expect("open");
    let mut reader = RecordReader::new(src, RecordReaderOptions::default());
    let mut out = Vec::new();
    while let Some(rec) = reader.read_record().expect("read") {
        out.push(rec);
    }
    assert_eq!(out, records);
}

#[test]
fn small_buffer_still_works() {
    let root = unique_root("smallbuf");
    std::fs::create_dir_all(&root).expect("create root");
    let path = root.join("records.sheaf");

    let records: Vec<Vec<u8>> = (0..30).map(|i| vec![i as u8; 100]).collect();
    {
        let dest = FileWriter::create(&path, FileWriterOptions::default().with_buffer_size(16))
            .expect("create");
        let mut writer =
            RecordWriter::new(dest, RecordWriterOptions::default()).expect("open writer");
        for rec in &records {
            writer.write_record(rec).expect("write");
        }
        writer.close().expect("close");
    }

    let src = FileReader::open(&path, FileReaderOptions::default().with_buffer_size(16))
        .expect("open");
    let mut reader = RecordReader::new(src, RecordReaderOptions::default());
    let mut out = Vec::new();
    while let Some(rec) = reader.read_record().expect("read") {
        out.push(rec);
    }
    assert_eq!(out, records);
}

#[test]
fn file_reader_seek_and_size() {
    let root = unique_root("seek");
    std::fs::create_dir_all(&root).expect("create root");
    let path = root.join("plain.bin");
    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    {
        let mut writer = FileWriter::create(&path, FileWriterOptions::default()).expect("create");
        writer.write(&payload).expect("write");
        writer.close().expect("close");
    }

    let mut reader = FileReader::open(&path, FileReaderOptions::default()).expect("open");
    assert_eq!(reader.size().expect("size"), payload.len() as u64);
    reader.seek(5000).expect("seek");
    let mut out = Vec::new();
    assert!(reader.read(100, &mut out).expect("read"));
    assert_eq!(out, payload[5000..5100]);
    // назад, в уже прочитанное окно
    reader.seek(0).expect("seek back");
    let mut head = Vec::new();
    assert!(reader.read(4, &mut head).expect("read"));
    assert_eq!(head, payload[..4]);
}

#[test]
fn file_writer_append_mode() {
    let root = unique_root("append");
    std::fs::create_dir_all(&root).expect("create root");
    let path = root.join("log.bin");
    {
        let mut writer = FileWriter::create(&path, FileWriterOptions::default()).expect("create");
        writer.write(b"first").expect("write");
        writer.close().expect("close");
    }
    {
        let mut writer = FileWriter::create(
            &path,
            FileWriterOptions::default().with_append(true),
        )
        .expect("append");
        assert_eq!(writer.pos(), 5);
        writer.write(b"|second").expect("write");
        writer.close().expect("close");
    }
    assert_eq!(std::fs::read(&path).expect("read"), b"first|second");
}

#[test]
fn metrics_move_on_write_and_read() {
    let before = Sheaf::metrics::snapshot();
    let root = unique_root("metrics");
    std::fs::create_dir_all(&root).expect("create root");
    let path = root.join("records.sheaf");
    {
        let dest = FileWriter::create(&path, FileWriterOptions::default()).expect("create");
        let mut writer =
            RecordWriter::new(dest, RecordWriterOptions::default()).expect("open writer");
        writer.write_record(b"x").expect("write");
        writer.close().expect("close");
    }
    let src = FileReader::open(&path, FileReaderOptions::default()).expect("open");
    let mut reader = RecordReader::new(src, RecordReaderOptions::default());
    while reader.read_record().expect("read").is_some() {}
    let after = Sheaf::metrics::snapshot();
    // сигнатура + чанк с данными
    assert!(after.chunks_written >= before.chunks_written + 2);
    assert!(after.chunks_read >= before.chunks_read + 2);
}
