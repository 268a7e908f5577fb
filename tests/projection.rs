use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::{
    Field, FieldProjection, RecordReader, RecordReaderOptions, RecordWriter, RecordWriterOptions,
};

// ---------- helpers ----------

fn write_transposed(records: &[Vec<u8>]) -> Vec<u8> {
    let mut dest = VecWriter::new();
    {
        let options = RecordWriterOptions::default().with_transpose(true);
        let mut writer: RecordWriter<VecWriter> =
            RecordWriter::new(&mut dest, options).expect("open writer");
        for record in records {
            writer.write_record(record).expect("write record");
        }
        writer.close().expect("close writer");
    }
    dest.into_vec()
}

fn read_with_projection(data: Vec<u8>, projection: FieldProjection) -> Vec<Vec<u8>> {
    let options = RecordReaderOptions::default().with_field_projection(projection);
    let mut reader = RecordReader::new(BytesReader::new(data), options);
    let mut out = Vec::new();
    while let Some(record) = reader.read_record().expect("read record") {
        out.push(record);
    }
    out
}

/// {a=1: "hi", b=2: {c=1: 7}}
fn sample_record() -> Vec<u8> {
    let mut rec = vec![0x0a, 0x02, b'h', b'i'];
    rec.extend_from_slice(&[0x12, 0x02, 0x08, 0x07]);
    rec
}

// ---------- tests ----------

#[test]
fn existence_only_and_nested_path() {
    let data = write_transposed(&[sample_record()]);
    // {[1, EXISTENCE_ONLY], [2, 1]}
    let projection = FieldProjection::new()
        .add(Field::existence_only(vec![1]))
        .add(Field::new(vec![2, 1]));
    let records = read_with_projection(data, projection);
    // a присутствует, но пустой; b.c сохранён целиком
    let expected = vec![vec![0x0a, 0x00, 0x12, 0x02, 0x08, 0x07]];
    assert_eq!(records, expected);
}

#[test]
fn excluded_field_disappears() {
    let data = write_transposed(&[sample_record()]);
    let projection = FieldProjection::new().add(Field::new(vec![2]));
    let records = read_with_projection(data, projection);
    assert_eq!(records, vec![vec![0x12, 0x02, 0x08, 0x07]]);
}

#[test]
fn full_projection_is_identity() {
    let original = vec![sample_record(), sample_record()];
    let data = write_transposed(&original);
    let records = read_with_projection(data, FieldProjection::all());
    assert_eq!(records, original);
}

#[test]
fn empty_projection_set_includes_all() {
    let original = vec![sample_record()];
    let data = write_transposed(&original);
    let records = read_with_projection(data, FieldProjection::new());
    assert_eq!(records, original);
}

#[test]
fn projection_of_scalar_field() {
    // {key=1: varint, value=2: string}
    let mut records = Vec::new();
    for i in 0..50u64 {
        let mut rec = vec![0x08];
        Sheaf::varint::write_varint64(&mut rec, 128 + i);
        rec.extend_from_slice(&[0x12, 0x03, b'v', b'a', b'l']);
        records.push(rec);
    }
    let data = write_transposed(&records);
    let projection = FieldProjection::new().add(Field::new(vec![1]));
    let projected = read_with_projection(data, projection);
    for (i, rec) in projected.iter().enumerate() {
        let mut expected = vec![0x08];
        Sheaf::varint::write_varint64(&mut expected, 128 + i as u64);
        assert_eq!(rec, &expected);
    }
}

#[test]
fn set_field_projection_rereads_current_chunk() {
    let original = vec![sample_record(), sample_record(), sample_record()];
    let data = write_transposed(&original);
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    let first = reader.read_record().expect("read").expect("record");
    assert_eq!(first, sample_record());

    let projection = FieldProjection::new().add(Field::new(vec![2]));
    reader
        .set_field_projection(projection)
        .expect("set projection");
    let second = reader.read_record().expect("read").expect("record");
    assert_eq!(second, vec![0x12, 0x02, 0x08, 0x07]);
}

#[test]
fn mid_path_existence_marker_is_rejected() {
    let data = write_transposed(&[sample_record()]);
    let projection = FieldProjection::new().add(Field::new(vec![
        Sheaf::encoding::projection::EXISTENCE_ONLY,
        1,
    ]));
    let options = RecordReaderOptions::default().with_field_projection(projection);
    let mut reader = RecordReader::new(BytesReader::new(data), options);
    let err = reader.read_record().expect_err("must fail");
    assert_eq!(
        Sheaf::status_code(&err),
        Sheaf::StatusCode::InvalidArgument
    );
}
