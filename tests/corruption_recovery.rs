use std::sync::{Arc, Mutex};

use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::chunk::{chunk_end, ChunkHeader, ChunkType, SkippedRegion};
use Sheaf::{RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions, StatusCode};

// ---------- helpers ----------

// ровно 40 байт: пять записей заполняют чанк размером 200
fn record(i: usize) -> Vec<u8> {
    let mut rec = format!("record-{:03}-", i).into_bytes();
    rec.extend_from_slice(&[i as u8; 29]);
    rec
}

/// 10 записей в двух чанках с данными.
fn build_two_chunk_file() -> Vec<u8> {
    let mut dest = VecWriter::new();
    {
        let options = RecordWriterOptions::default().with_chunk_size(200);
        let mut writer: RecordWriter<VecWriter> = RecordWriter::new(&mut dest, options).expect("open writer");
        for i in 0..10 {
            writer.write_record(&record(i)).expect("write");
        }
        writer.close().expect("close");
    }
    dest.into_vec()
}

/// Начала чанков по заголовкам.
fn chunk_begins(data: &[u8]) -> Vec<(u64, ChunkType)> {
    let mut begins = Vec::new();
    let mut pos = 0u64;
    while (pos as usize) < data.len() {
        let mut bytes = [0u8; 40];
        bytes.copy_from_slice(&data[pos as usize..pos as usize + 40]);
        let header = ChunkHeader::from_bytes(bytes);
        assert_eq!(
            header.computed_header_hash(),
            header.stored_header_hash(),
            "corrupt walk at {}",
            pos
        );
        begins.push((pos, header.chunk_type().expect("type")));
        pos = chunk_end(&header, pos);
    }
    begins
}

// ---------- tests ----------

#[test]
fn data_hash_mismatch_is_data_loss_with_offset() {
    let mut data = build_two_chunk_file();
    let begins = chunk_begins(&data);
    // второй чанк с данными (после сигнатуры и первого)
    let (second_begin, _) = begins[2];
    data[second_begin as usize + 45] ^= 0xff;

    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    for i in 0..5 {
        let rec = reader.read_record().expect("read").expect("record");
        assert_eq!(rec, record(i));
    }
    let err = reader.read_record().expect_err("corrupt chunk must fail");
    assert_eq!(Sheaf::status_code(&err), StatusCode::DataLoss);
    let message = format!("{:#}", err);
    assert!(
        message.contains(&format!("chunk at {}", second_begin)),
        "message must mention the byte offset: {}",
        message
    );
}

#[test]
fn recovery_skips_corrupt_chunk_payload() {
    let mut data = build_two_chunk_file();
    let begins = chunk_begins(&data);
    let (second_begin, _) = begins[2];
    let file_len = data.len() as u64;
    data[second_begin as usize + 45] ^= 0xff;

    let regions: Arc<Mutex<Vec<SkippedRegion>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&regions);
    let options = RecordReaderOptions::default().with_recovery(Box::new(move |region| {
        sink.lock().unwrap().push(region.clone());
        true
    }));

    let mut reader = RecordReader::new(BytesReader::new(data), options);
    let mut records = Vec::new();
    while let Some(rec) = reader.read_record().expect("read") {
        records.push(rec);
    }
    // первый чанк прочитан, второй пропущен целиком
    assert_eq!(records, (0..5).map(record).collect::<Vec<_>>());
    let regions = regions.lock().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].begin, second_begin);
    assert_eq!(regions[0].end, file_len);
    assert!(regions[0].message.contains("hash mismatch"));
}

#[test]
fn recovery_resyncs_after_corrupt_header() {
    let mut data = build_two_chunk_file();
    let begins = chunk_begins(&data);
    let (first_begin, _) = begins[1];
    let (second_begin, _) = begins[2];
    // затираем заголовок и часть нагрузки первого чанка с данными
    for b in &mut data[first_begin as usize + 2..first_begin as usize + 60] {
        *b = 0;
    }

    let regions: Arc<Mutex<Vec<SkippedRegion>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&regions);
    let options = RecordReaderOptions::default().with_recovery(Box::new(move |region| {
        sink.lock().unwrap().push(region.clone());
        true
    }));

    let mut reader = RecordReader::new(BytesReader::new(data), options);
    let mut records = Vec::new();
    while let Some(rec) = reader.read_record().expect("read") {
        records.push(rec);
    }
    // уцелели записи второго чанка
    assert_eq!(records, (5..10).map(record).collect::<Vec<_>>());
    let regions = regions.lock().unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].begin, first_begin);
    assert_eq!(regions[0].end, second_begin);
}

#[test]
fn callback_can_stop_reading() {
    let mut data = build_two_chunk_file();
    let begins = chunk_begins(&data);
    let (second_begin, _) = begins[2];
    data[second_begin as usize + 45] ^= 0xff;

    let options = RecordReaderOptions::default().with_recovery(Box::new(|_region| false));
    let mut reader = RecordReader::new(BytesReader::new(data), options);
    let mut count = 0;
    while reader.read_record().expect("read").is_some() {
        count += 1;
    }
    assert_eq!(count, 5);
    assert!(reader.healthy());
}

#[test]
fn sticky_failure_without_recovery() {
    let mut data = build_two_chunk_file();
    let begins = chunk_begins(&data);
    let (second_begin, _) = begins[2];
    data[second_begin as usize + 45] ^= 0xff;

    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    for _ in 0..5 {
        reader.read_record().expect("read").expect("record");
    }
    let first = reader.read_record().expect_err("fail");
    let second = reader.read_record().expect_err("still failed");
    assert_eq!(Sheaf::status_code(&first), StatusCode::DataLoss);
    assert_eq!(Sheaf::status_code(&second), StatusCode::DataLoss);
    assert_eq!(format!("{:#}", first), format!("{:#}", second));
}
