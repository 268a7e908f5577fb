use std::cmp::Ordering;

use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::varint::parse_varint64;
use Sheaf::{RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions};

// ---------- helpers ----------

/// Запись с ключом: протобуф-поле 1 (varint).
fn make_record(key: u64) -> Vec<u8> {
    let mut rec = vec![0x08];
    Sheaf::varint::write_varint64(&mut rec, key);
    rec
}

fn record_key(record: &[u8]) -> u64 {
    assert_eq!(record[0], 0x08);
    parse_varint64(&record[1..]).expect("key varint").0
}

fn build_file(keys: impl Iterator<Item = u64>) -> Vec<u8> {
    let mut dest = VecWriter::new();
    {
        let options = RecordWriterOptions::default().with_chunk_size(64);
        let mut writer: RecordWriter<VecWriter> = RecordWriter::new(&mut dest, options).expect("open writer");
        for key in keys {
            writer.write_record(&make_record(key)).expect("write");
        }
        writer.close().expect("close");
    }
    dest.into_vec()
}

fn search_key(data: Vec<u8>, target: u64) -> (bool, Option<u64>) {
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    let found = reader
        .search(|r| {
            let record = match r.read_record()? {
                Some(rec) => rec,
                None => return Ok(None),
            };
            Ok(Some(record_key(&record).cmp(&target)))
        })
        .expect("search");
    let key_at_position = reader
        .read_record()
        .expect("read at position")
        .map(|rec| record_key(&rec));
    (found, key_at_position)
}

// ---------- tests ----------

#[test]
fn search_finds_existing_key() {
    let data = build_file(0..1000);
    let (found, key) = search_key(data, 500);
    assert!(found);
    assert_eq!(key, Some(500));
}

#[test]
fn search_finds_first_and_last() {
    let data = build_file(0..1000);
    let (_, first) = search_key(data.clone(), 0);
    assert_eq!(first, Some(0));
    let (_, last) = search_key(data, 999);
    assert_eq!(last, Some(999));
}

#[test]
fn search_missing_key_lands_on_next_greater() {
    // только чётные ключи
    let data = build_file((0..1000).map(|k| k * 2));
    let (found, key) = search_key(data, 301);
    assert!(found);
    assert_eq!(key, Some(302));
}

#[test]
fn search_past_end_lands_at_end() {
    let data = build_file(0..100);
    let (found, key) = search_key(data, 10_000);
    assert!(found);
    assert_eq!(key, None);
}
