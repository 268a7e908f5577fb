use Sheaf::bytes::{BytesReader, VecWriter};
use Sheaf::chunk::{Chunk, ChunkType, ChunkWriter};
use Sheaf::varint::{write_varint32, write_varint64};
use Sheaf::{RecordReader, RecordReaderOptions, StatusCode};

// ---------- helpers ----------

/// Собрать файл: сигнатура + один чанк с заданной нагрузкой.
fn file_with_chunk(chunk_type: ChunkType, payload: Vec<u8>, num_records: u64) -> Vec<u8> {
    let mut dest = VecWriter::new();
    {
        let mut writer: ChunkWriter<VecWriter> = ChunkWriter::new(&mut dest).expect("chunk writer");
        let signature = Chunk::new(ChunkType::FileSignature, Vec::new(), 0, 0).expect("sig");
        writer.write_chunk(&signature).expect("write signature");
        let chunk = Chunk::new(chunk_type, payload, num_records, 0).expect("chunk");
        writer.write_chunk(&chunk).expect("write chunk");
        writer.close().expect("close");
    }
    dest.into_vec()
}

fn read_error(data: Vec<u8>) -> anyhow::Error {
    let mut reader = RecordReader::new(BytesReader::new(data), RecordReaderOptions::default());
    reader.read_record().expect_err("must fail")
}

// ---------- tests ----------

#[test]
fn implicit_loop_is_rejected() {
    // машина из двух NoOp-узлов с неявными переходами друг в друга
    let mut header = Vec::new();
    write_varint32(&mut header, 0); // num_buckets
    write_varint32(&mut header, 0); // num_buffers
    write_varint32(&mut header, 2); // state_machine_size
    write_varint32(&mut header, 0); // tag: NoOp
    write_varint32(&mut header, 0); // tag: NoOp
    write_varint32(&mut header, 2 + 1); // next: узел 1, неявный
    write_varint32(&mut header, 2 + 0); // next: узел 0, неявный
    write_varint32(&mut header, 0); // first_node

    let mut payload = vec![0u8]; // без сжатия
    write_varint64(&mut payload, header.len() as u64);
    payload.extend_from_slice(&header);

    let err = read_error(file_with_chunk(ChunkType::Transposed, payload, 1));
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
    assert!(
        format!("{:#}", err).contains("implicit loop"),
        "unexpected message: {:#}",
        err
    );
}

#[test]
fn unknown_chunk_compression_is_rejected() {
    let payload = vec![0x7a ^ 0xff]; // мусорный байт сжатия
    let err = read_error(file_with_chunk(ChunkType::Simple, payload, 1));
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
}

#[test]
fn truncated_simple_payload_is_rejected() {
    // заявлены записи, но нагрузка пуста
    let err = read_error(file_with_chunk(ChunkType::Simple, Vec::new(), 3));
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
}

#[test]
fn transposed_buffer_index_out_of_range_is_rejected() {
    // один NonProto-узел ссылается на несуществующий буфер
    let mut header = Vec::new();
    write_varint32(&mut header, 0); // num_buckets
    write_varint32(&mut header, 0); // num_buffers
    write_varint32(&mut header, 1); // state_machine_size
    write_varint32(&mut header, 1); // tag: NonProto
    write_varint32(&mut header, 0); // next
    write_varint32(&mut header, 5); // buffer index: вне диапазона
    write_varint32(&mut header, 0); // first_node

    let mut payload = vec![0u8];
    write_varint64(&mut payload, header.len() as u64);
    payload.extend_from_slice(&header);

    let err = read_error(file_with_chunk(ChunkType::Transposed, payload, 1));
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
}

#[test]
fn truncated_file_reports_data_loss() {
    let mut dest = VecWriter::new();
    {
        let options = Sheaf::RecordWriterOptions::default();
        let mut writer: Sheaf::RecordWriter<VecWriter> =
            Sheaf::RecordWriter::new(&mut dest, options).expect("open writer");
        writer.write_record(&vec![7u8; 500]).expect("write");
        writer.close().expect("close");
    }
    let mut data = dest.into_vec();
    data.truncate(data.len() - 100);

    let err = read_error(data);
    assert_eq!(Sheaf::status_code(&err), StatusCode::DataLoss);
    assert!(format!("{:#}", err).contains("truncated"));
}
