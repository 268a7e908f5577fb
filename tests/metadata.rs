use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::{RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions, StatusCode};

// ---------- helpers ----------

/// Похоже на сериализованный RecordsMetadata: field1 string + field2 varint.
fn sample_metadata() -> Vec<u8> {
    let mut m = vec![0x0a, 0x08];
    m.extend_from_slice(b"rec.Type");
    m.extend_from_slice(&[0x10, 0x2a]);
    m
}

fn write_with_metadata(metadata: Option<Vec<u8>>, records: &[&[u8]]) -> Vec<u8> {
    let mut dest = VecWriter::new();
    {
        let options = RecordWriterOptions::default().with_metadata(metadata);
        let mut writer: RecordWriter<VecWriter> = RecordWriter::new(&mut dest, options).expect("open writer");
        for record in records {
            writer.write_record(record).expect("write");
        }
        writer.close().expect("close");
    }
    dest.into_vec()
}

// ---------- tests ----------

#[test]
fn metadata_roundtrip() {
    let data = write_with_metadata(Some(sample_metadata()), &[b"r0", b"r1"]);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    let metadata = reader.read_metadata().expect("read metadata");
    assert_eq!(metadata, Some(sample_metadata()));
    // записи идут следом
    assert_eq!(
        reader.read_record().expect("read").expect("record"),
        b"r0".to_vec()
    );
    assert_eq!(
        reader.read_record().expect("read").expect("record"),
        b"r1".to_vec()
    );
    assert!(reader.read_record().expect("read").is_none());
}

#[test]
fn missing_metadata_reads_as_none() {
    let data = write_with_metadata(None, &[b"r0"]);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    assert_eq!(reader.read_metadata().expect("read metadata"), None);
    assert_eq!(
        reader.read_record().expect("read").expect("record"),
        b"r0".to_vec()
    );
}

#[test]
fn metadata_after_records_is_failed_precondition() {
    let data = write_with_metadata(Some(sample_metadata()), &[b"r0"]);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    reader.read_record().expect("read").expect("record");
    let err = reader.read_metadata().expect_err("must fail");
    assert_eq!(Sheaf::status_code(&err), StatusCode::FailedPrecondition);
}

#[test]
fn opaque_metadata_survives() {
    // метаданные, не являющиеся протобуфом, тоже переживают кодек
    let metadata = vec![0x00, 0xfe, 0xff, 0x01, 0x02];
    let data = write_with_metadata(Some(metadata.clone()), &[b"r0"]);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    assert_eq!(reader.read_metadata().expect("read"), Some(metadata));
}

#[test]
fn records_readable_without_touching_metadata() {
    let data = write_with_metadata(Some(sample_metadata()), &[b"r0"]);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    // metadata-чанк прозрачен для обычного чтения
    assert_eq!(
        reader.read_record().expect("read").expect("record"),
        b"r0".to_vec()
    );
}
