use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::{RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions};

// ---------- helpers ----------

fn sample_records(n: usize) -> Vec<Vec<u8>> {
    let mut rng = oorandom::Rand32::new(7);
    (0..n)
        .map(|i| {
            let len = (rng.rand_u32() % 90 + 1) as usize;
            let mut rec = vec![0u8; len];
            for (j, b) in rec.iter_mut().enumerate() {
                *b = ((i * 31 + j) % 251) as u8;
            }
            rec
        })
        .collect()
}

fn write_all(records: &[Vec<u8>], options: RecordWriterOptions) -> Vec<u8> {
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
fn seek_to_recorded_positions() {
    let records = sample_records(50);
    let options = RecordWriterOptions::default().with_chunk_size(256);
    let data = write_all(&records, options);

    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    let mut positions = Vec::new();
    while let Some(record) = reader.read_record().expect("read") {
        let pos = reader.last_pos().expect("last pos");
        positions.push((pos, record));
    }
    assert_eq!(positions.len(), records.len());

    // перечитывание по сохранённым позициям даёт те же байты
    for (pos, expected) in positions.iter().rev() {
        reader.seek(*pos).expect("seek");
        let record = reader.read_record().expect("read").expect("record");
        assert_eq!(&record, expected, "at {}", pos);
    }

    // то же по числовой форме
    for (pos, expected) in &positions {
        reader.seek_numeric(pos.numeric()).expect("seek numeric");
        let record = reader.read_record().expect("read").expect("record");
        assert_eq!(&record, expected, "numeric {}", pos.numeric());
    }
}

#[test]
fn read_then_seek_back_rereads_record() {
    let records = sample_records(30);
    let options = RecordWriterOptions::default().with_chunk_size(128);
    let data = write_all(&records, options);

    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    loop {
        let first = match reader.read_record().expect("read") {
            Some(r) => r,
            None => break,
        };
        assert!(reader.seek_back().expect("seek back"));
        let second = reader.read_record().expect("reread").expect("record");
        assert_eq!(first, second);
    }
}

#[test]
fn seek_back_skips_zero_record_chunks() {
    let mut dest = VecWriter::new();
    {
        let mut writer: RecordWriter<VecWriter> =
            RecordWriter::new(&mut dest, RecordWriterOptions::default()).expect("open writer");
        writer.write_record(b"first").expect("write");
        // граница чанка + padding-чанк без записей между данными
        writer.pad_to_block_boundary().expect("pad");
        writer.write_record(b"second").expect("write");
        writer.close().expect("close");
    }
    let data = dest.into_vec();

    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    assert_eq!(
        reader.read_record().expect("read").expect("record"),
        b"first".to_vec()
    );
    assert_eq!(
        reader.read_record().expect("read").expect("record"),
        b"second".to_vec()
    );
    // назад: second, затем через padding-чанк к first
    assert!(reader.seek_back().expect("back to second"));
    assert!(reader.seek_back().expect("back to first"));
    let record = reader.read_record().expect("read").expect("record");
    assert_eq!(record, b"first".to_vec());
    // дальше записей нет
    assert!(reader.seek_back().expect("back"));
    assert!(!reader.seek_back().expect("at beginning"));
}
