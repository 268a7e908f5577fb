use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::{RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions};

// ---------- helpers ----------

fn roundtrip(records: &[Vec<u8>], options: RecordWriterOptions) -> Vec<Vec<u8>> {
    let mut dest = VecWriter::new();
    {
        let mut writer: RecordWriter<VecWriter> = RecordWriter::new(&mut dest, options).expect("open writer");
        for record in records {
            writer.write_record(record).expect("write record");
        }
        writer.close().expect("close writer");
    }
    let data = dest.into_vec();
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    let mut out = Vec::new();
    while let Some(record) = reader.read_record().expect("read record") {
        out.push(record);
    }
    out
}

fn transposed() -> RecordWriterOptions {
    RecordWriterOptions::default().with_transpose(true)
}

/// field 1, varint
fn varint_field(value: u64) -> Vec<u8> {
    let mut rec = vec![0x08];
    Sheaf::varint::write_varint64(&mut rec, value);
    rec
}

/// field 2, length-delimited
fn string_field(value: &[u8]) -> Vec<u8> {
    let mut rec = vec![0x12];
    Sheaf::varint::write_varint64(&mut rec, value.len() as u64);
    rec.extend_from_slice(value);
    rec
}

// ---------- tests ----------

#[test]
fn identity_on_proto_records() {
    let records = vec![
        varint_field(0),
        varint_field(5),
        varint_field(127),
        varint_field(128),
        varint_field(u64::MAX),
        string_field(b""),
        string_field(b"hello"),
        {
            // fixed32 (field 3) + fixed64 (field 4)
            let mut rec = vec![0x1d, 1, 2, 3, 4];
            rec.extend_from_slice(&[0x21, 9, 8, 7, 6, 5, 4, 3, 2]);
            rec
        },
    ];
    assert_eq!(roundtrip(&records, transposed()), records);
}

#[test]
fn identity_on_nested_submessages() {
    // {a=1: {b=2: varint 7, c=3: "xy"}, d=4: varint 300}
    let inner = {
        let mut m = vec![0x10, 0x07]; // field2 varint 7
        m.extend_from_slice(&[0x1a, 0x02, b'x', b'y']); // field3 string "xy"
        m
    };
    let mut record = vec![0x0a, inner.len() as u8];
    record.extend_from_slice(&inner);
    record.extend_from_slice(&[0x20, 0xac, 0x02]); // field4 varint 300

    let records = vec![record.clone(), record];
    assert_eq!(roundtrip(&records, transposed()), records);
}

#[test]
fn identity_on_non_proto_records() {
    let records = vec![
        vec![],
        vec![0xff, 0x07], // невалидный wire type
        vec![0x08],       // оборванный varint
        vec![0x00, b'p', b'l', b'a', b'i', b'n'], // нулевой тег
        vec![0u8; 300],
    ];
    assert_eq!(roundtrip(&records, transposed()), records);
}

#[test]
fn identity_on_mixed_records() {
    let mut records = Vec::new();
    for i in 0..200u64 {
        if i % 3 == 0 {
            records.push(b"opaque".to_vec());
        } else {
            records.push(varint_field(i * 37));
        }
    }
    assert_eq!(roundtrip(&records, transposed()), records);
}

#[test]
fn identity_preserves_non_minimal_value_varints() {
    // значение 0, закодированное двумя байтами: копируется как есть
    let record = vec![0x08, 0x80, 0x00];
    let records = vec![record];
    assert_eq!(roundtrip(&records, transposed()), records);
}

#[test]
fn identity_with_many_distinct_fields() {
    // больше 64 узлов, а у границы записей два далёких преемника:
    // включается маршрутизация переходов через NoOp-узлы
    let mut big = Vec::new();
    for field in 1..=80u32 {
        Sheaf::varint::write_varint32(&mut big, field << 3);
        Sheaf::varint::write_varint64(&mut big, 1000 + field as u64);
    }
    let small = varint_field(100_000);
    let mut records = Vec::new();
    for i in 0..20 {
        records.push(if i % 2 == 0 { small.clone() } else { big.clone() });
    }
    assert_eq!(roundtrip(&records, transposed()), records);
}

#[test]
fn identity_across_many_records_and_chunks() {
    let mut rng = oorandom::Rand32::new(11);
    let mut records = Vec::new();
    for i in 0..500u64 {
        let mut rec = varint_field(i);
        rec.extend_from_slice(&string_field(
            &vec![(rng.rand_u32() % 251) as u8; (rng.rand_u32() % 40) as usize],
        ));
        records.push(rec);
    }
    let options = transposed().with_chunk_size(2048);
    assert_eq!(roundtrip(&records, options), records);
}

#[test]
fn empty_proto_record_survives() {
    let records = vec![vec![], varint_field(1), vec![]];
    assert_eq!(roundtrip(&records, transposed()), records);
}
