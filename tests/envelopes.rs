use Sheaf::bytes::splitting::numbered_file_shards;
use Sheaf::bytes::{
    BytesReader, DigestingReader, DigestingWriter, FileWriterOptions, FlushKind, LimitingWriter,
    Reader, SplittingWriter, VecWriter, Writer,
};
use Sheaf::compress::{HadoopSnappyReader, HadoopSnappyWriter, HadoopSnappyWriterOptions};
use Sheaf::hash::{hash_bytes, Xx64Digester};
use Sheaf::StatusCode;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

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
    base.join(format!("sheaftest-env-{prefix}-{pid}-{t}-{id}"))
}

// ---------- limiting ----------

#[test]
fn limiting_writer_enforces_size_limit() {
    let mut dest = VecWriter::new();
    {
        let mut limited: LimitingWriter<VecWriter> = LimitingWriter::new(&mut dest, 10);
        limited.write(b"12345").expect("within limit");
        let err = limited.write(b"6789ab").expect_err("over limit");
        assert_eq!(Sheaf::status_code(&err), StatusCode::ResourceExhausted);
        // сбой липкий
        let err2 = limited.write(b"x").expect_err("sticky");
        assert_eq!(Sheaf::status_code(&err2), StatusCode::ResourceExhausted);
    }
    assert_eq!(dest.into_vec(), b"12345");
}

#[test]
fn limiting_writer_allows_exact_fit() {
    let mut dest = VecWriter::new();
    let mut limited: LimitingWriter<VecWriter> = LimitingWriter::new(&mut dest, 5);
    limited.write(b"12345").expect("exact fit");
    limited.flush(FlushKind::FromObject).expect("flush");
    assert_eq!(limited.pos(), 5);
}

// ---------- splitting ----------

#[test]
fn splitting_writer_rolls_numbered_shards() {
    let root = unique_root("split");
    std::fs::create_dir_all(&root).expect("create root");
    {
        let factory = numbered_file_shards(&root, "data", "shard", FileWriterOptions::default());
        let mut writer = SplittingWriter::new(100, factory);
        let payload: Vec<u8> = (0..250u32).map(|i| (i % 251) as u8).collect();
        writer.write(&payload).expect("write");
        writer.close().expect("close");
        assert_eq!(writer.shard_count(), 3);
    }
    let mut names: Vec<String> = std::fs::read_dir(&root)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().into_string().expect("name"))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["data-00001.shard", "data-00002.shard", "data-00003.shard"]
    );
    let a = std::fs::read(root.join("data-00001.shard")).expect("shard 1");
    let b = std::fs::read(root.join("data-00002.shard")).expect("shard 2");
    let c = std::fs::read(root.join("data-00003.shard")).expect("shard 3");
    assert_eq!(a.len(), 100);
    assert_eq!(b.len(), 100);
    assert_eq!(c.len(), 50);
    let mut joined = a;
    joined.extend_from_slice(&b);
    joined.extend_from_slice(&c);
    let expected: Vec<u8> = (0..250u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(joined, expected);
}

// ---------- digesting ----------

#[test]
fn digesting_writer_hashes_all_bytes() {
    let mut dest = VecWriter::new();
    let mut digesting: DigestingWriter<VecWriter, _> =
        DigestingWriter::new(&mut dest, Xx64Digester::new());
    digesting.write(b"hello ").expect("write");
    digesting.write_zeros(4).expect("zeros");
    digesting.write(b"world").expect("write");
    let digest = digesting.digest();
    let mut expected = b"hello ".to_vec();
    expected.extend_from_slice(&[0u8; 4]);
    expected.extend_from_slice(b"world");
    assert_eq!(digest, hash_bytes(&expected));
    drop(digesting);
    assert_eq!(dest.into_vec(), expected);
}

#[test]
fn digesting_reader_hashes_consumed_bytes() {
    let payload = b"the quick brown fox".to_vec();
    let inner = BytesReader::new(payload.clone());
    let mut digesting = DigestingReader::new(inner, Xx64Digester::new());
    let mut out = Vec::new();
    assert!(digesting.read(payload.len(), &mut out).expect("read"));
    assert_eq!(out, payload);
    assert_eq!(digesting.digest(), hash_bytes(&payload));
}

// ---------- hadoop-snappy ----------

#[test]
fn hadoop_snappy_roundtrip() {
    let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 13) as u8).collect();
    let mut dest = VecWriter::new();
    {
        let options = HadoopSnappyWriterOptions::default().with_block_size(16 * 1024);
        let mut writer: HadoopSnappyWriter<VecWriter> =
            HadoopSnappyWriter::new(&mut dest, options);
        for piece in payload.chunks(7777) {
            writer.write(piece).expect("write");
        }
        writer.close().expect("close");
    }
    let framed = dest.into_vec();
    assert!(framed.len() < payload.len(), "compressible data must shrink");

    let mut reader = HadoopSnappyReader::new(BytesReader::new(framed));
    let mut out = Vec::new();
    assert!(reader.read(payload.len(), &mut out).expect("read"));
    assert_eq!(out, payload);
    assert!(!reader.pull(1).expect("end"));
}

#[test]
fn hadoop_snappy_truncated_block_fails() {
    let payload = vec![1u8; 1000];
    let mut dest = VecWriter::new();
    {
        let mut writer: HadoopSnappyWriter<VecWriter> =
            HadoopSnappyWriter::new(&mut dest, HadoopSnappyWriterOptions::default());
        writer.write(&payload).expect("write");
        writer.close().expect("close");
    }
    let mut framed = dest.into_vec();
    framed.truncate(framed.len() - 3);

    let mut reader = HadoopSnappyReader::new(BytesReader::new(framed));
    let mut out = Vec::new();
    let err = reader.read(payload.len(), &mut out).expect_err("truncated");
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
}
