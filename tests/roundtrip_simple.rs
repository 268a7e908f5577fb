use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::{RecordPosition, RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions};

// ---------- helpers ----------

fn write_to_vec(records: &[&[u8]], options: RecordWriterOptions) -> Vec<u8> {
    let mut dest = VecWriter::new();
    {
        let mut writer: RecordWriter<VecWriter> = RecordWriter::new(&mut dest, options).expect("open writer");
        for record in records {
            writer.write_record(record).expect("write record");
        }
        writer.close().expect("close writer");
    }
    dest.into_vec()
}

// ---------- tests ----------

#[test]
fn roundtrip_three_records() {
    let data = write_to_vec(&[b"", b"a", b"abc"], RecordWriterOptions::default());

    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    let mut records = Vec::new();
    let mut positions = Vec::new();
    while let Some(record) = reader.read_record().expect("read record") {
        records.push(record);
        positions.push(reader.last_pos().expect("last pos"));
    }

    assert_eq!(records, vec![b"".to_vec(), b"a".to_vec(), b"abc".to_vec()]);
    // сигнатура занимает [0..40), первый чанк с данными начинается на 40
    assert_eq!(
        positions,
        vec![
            RecordPosition::new(40, 0),
            RecordPosition::new(40, 1),
            RecordPosition::new(40, 2),
        ]
    );
}

#[test]
fn size_matches_file_length() {
    let data = write_to_vec(&[b"x", b"y"], RecordWriterOptions::default());
    let len = data.len() as u64;
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    assert_eq!(reader.size().expect("size"), len);
}

#[test]
fn empty_file_has_only_signature() {
    let data = write_to_vec(&[], RecordWriterOptions::default());
    assert_eq!(data.len(), 40);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    assert!(reader.check_file_format().expect("format"));
    assert!(reader.read_record().expect("read").is_none());
}

#[test]
fn position_roundtrip_text_and_bytes() {
    let pos = RecordPosition::new(1234, 7);
    assert_eq!(pos.to_string(), "1234/7");
    assert_eq!("1234/7".parse::<RecordPosition>().unwrap(), pos);
    assert_eq!(pos.numeric(), 1241);
    let bytes = pos.to_bytes();
    assert_eq!(RecordPosition::from_bytes(&bytes).unwrap(), pos);
    // бинарная форма сортируется как сами позиции
    let later = RecordPosition::new(1234, 8).to_bytes();
    assert!(bytes < later);
}

#[test]
fn writer_reports_positions() {
    let mut dest = VecWriter::new();
    let mut writer: RecordWriter<VecWriter> =
        RecordWriter::new(&mut dest, RecordWriterOptions::default()).expect("open writer");
    assert_eq!(writer.pos(), RecordPosition::new(40, 0));
    writer.write_record(b"abc").expect("write");
    assert_eq!(writer.last_pos(), Some(RecordPosition::new(40, 0)));
    assert_eq!(writer.pos(), RecordPosition::new(40, 1));
    writer.close().expect("close");
}
