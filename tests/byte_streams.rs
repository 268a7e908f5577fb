use Sheaf::bytes::{
    BackwardWriter, BytesReader, ChainReader, ChainWriter, FlushKind, Reader, VecBackwardWriter,
    VecWriter, Writer,
};
use Sheaf::chain::{Chain, MAX_SEGMENT_SIZE};
use Sheaf::StatusCode;

// ---------- Chain / ChainReader ----------

#[test]
fn chain_reader_window_is_current_segment() {
    let mut chain = Chain::new();
    chain.push_segment(vec![1, 2, 3]);
    chain.push_segment(vec![4, 5, 6, 7, 8]);
    let mut reader = ChainReader::new(&chain);
    assert!(reader.pull(3).expect("pull"));
    assert_eq!(reader.peek(), &[1, 2, 3]);
    reader.consume(2);
    assert_eq!(reader.available(), 1);
}

#[test]
fn chain_reader_scratch_bridges_segments() {
    let mut chain = Chain::new();
    chain.push_segment(vec![1, 2, 3]);
    chain.push_segment(vec![4, 5]);
    chain.push_segment(vec![6, 7, 8, 9]);
    let mut reader = ChainReader::new(&chain);
    reader.consume(0);
    // окно сегмента — 3 байта, запрошено 7: включается scratch
    assert!(reader.pull(7).expect("pull"));
    assert!(reader.available() >= 7);
    assert_eq!(&reader.peek()[..7], &[1, 2, 3, 4, 5, 6, 7]);
    reader.consume(7);
    assert_eq!(reader.pos(), 7);
    // после scratch чтение продолжается с реальной позиции
    let mut rest = Vec::new();
    assert!(reader.read(2, &mut rest).expect("read"));
    assert_eq!(rest, vec![8, 9]);
    assert!(!reader.pull(1).expect("pull"));
}

#[test]
fn chain_reader_seek_discards_scratch() {
    let mut chain = Chain::new();
    chain.push_segment(vec![10, 11]);
    chain.push_segment(vec![12, 13]);
    let mut reader = ChainReader::new(&chain);
    assert!(reader.pull(4).expect("pull"));
    reader.seek(1).expect("seek");
    assert_eq!(reader.pos(), 1);
    let mut out = Vec::new();
    assert!(reader.read(3, &mut out).expect("read"));
    assert_eq!(out, vec![11, 12, 13]);
}

#[test]
fn chain_reader_eof_short_pull() {
    let chain = Chain::from_vec(vec![1, 2]);
    let mut reader = ChainReader::new(&chain);
    assert!(!reader.pull(3).expect("pull"));
    // окно не тронуто, данные читаются
    assert!(reader.pull(2).expect("pull"));
}

// ---------- ChainWriter ----------

#[test]
fn chain_writer_collects_segments() {
    let mut writer = ChainWriter::new(Chain::new());
    writer.write(b"hello ").expect("write");
    writer.write(b"world").expect("write");
    let chain = writer.into_chain().expect("chain");
    assert_eq!(chain.to_vec(), b"hello world");
}

#[test]
fn chain_writer_scratch_for_oversized_window() {
    let mut writer = ChainWriter::new(Chain::new());
    let big = MAX_SEGMENT_SIZE + 100;
    // окно больше предельного сегмента обслуживает scratch
    writer.push(big).expect("push");
    assert!(writer.available() >= big);
    let pattern: Vec<u8> = (0..big).map(|i| (i % 251) as u8).collect();
    writer.buffer()[..big].copy_from_slice(&pattern);
    writer.advance(big);
    assert_eq!(writer.pos(), big as u64);
    // после scratch запись продолжается в обычном режиме
    writer.write(b"tail").expect("write");
    let chain = writer.into_chain().expect("chain");
    let mut expected = pattern;
    expected.extend_from_slice(b"tail");
    assert_eq!(chain.to_vec(), expected);
    // сегменты не превышают предельного размера
    let got = writer_segments_max(&chain);
    assert!(got <= MAX_SEGMENT_SIZE);
}

fn writer_segments_max(chain: &Chain) -> usize {
    chain.segments().iter().map(|s| s.len()).max().unwrap_or(0)
}

#[test]
fn chain_writer_passes_whole_chains_through() {
    let mut source = Chain::new();
    source.push_segment(vec![9u8; 10]);
    source.push_segment(vec![8u8; 20]);
    let mut writer = ChainWriter::new(Chain::new());
    writer.write(b"prefix-").expect("write");
    writer.write_chain(&source).expect("write chain");
    let chain = writer.into_chain().expect("chain");
    let mut expected = b"prefix-".to_vec();
    expected.extend_from_slice(&vec![9u8; 10]);
    expected.extend_from_slice(&vec![8u8; 20]);
    assert_eq!(chain.to_vec(), expected);
}

// ---------- VecBackwardWriter ----------

#[test]
fn backward_writer_prepends() {
    let mut writer = VecBackwardWriter::new();
    writer.prepend(b"world").expect("prepend");
    writer.prepend(b" ").expect("prepend");
    writer.prepend(b"hello").expect("prepend");
    assert_eq!(writer.pos(), 11);
    assert_eq!(writer.into_vec(), b"hello world");
}

#[test]
fn backward_writer_zero_prepend_is_noop() {
    let mut writer = VecBackwardWriter::new();
    writer.prepend(b"").expect("prepend");
    writer.prepend_zeros(0).expect("zeros");
    assert_eq!(writer.pos(), 0);
    assert!(writer.into_vec().is_empty());
}

#[test]
fn backward_writer_exact_capacity_avoids_growth() {
    let mut writer = VecBackwardWriter::with_size_hint(8);
    assert_eq!(writer.front_capacity(), 8);
    writer.prepend(&[1, 2, 3, 4, 5, 6, 7, 8]).expect("prepend");
    assert_eq!(writer.front_capacity(), 0);
    assert_eq!(writer.into_vec(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn backward_writer_varint_prefix() {
    let mut writer = VecBackwardWriter::new();
    writer.prepend(b"abc").expect("prepend");
    writer.prepend_varint32(3).expect("varint");
    assert_eq!(writer.into_vec(), vec![0x03, b'a', b'b', b'c']);
}

#[test]
fn backward_writer_respects_limit() {
    let mut writer = VecBackwardWriter::new().with_limit(4);
    writer.prepend(&[1, 2, 3]).expect("prepend");
    let err = writer.prepend(&[4, 5]).expect_err("over limit");
    assert_eq!(Sheaf::status_code(&err), StatusCode::ResourceExhausted);
}

// ---------- VecWriter ----------

#[test]
fn vec_writer_seek_and_truncate() {
    let mut writer = VecWriter::new();
    writer.write(b"0123456789").expect("write");
    writer.seek(4).expect("seek");
    writer.write(b"xy").expect("write");
    assert_eq!(writer.size().expect("size"), 10);
    writer.truncate(8).expect("truncate");
    assert_eq!(writer.written(), b"0123xy67");
}

#[test]
fn vec_writer_write_zeros() {
    let mut writer = VecWriter::new();
    writer.write(b"ab").expect("write");
    writer.write_zeros(3).expect("zeros");
    writer.write(b"cd").expect("write");
    assert_eq!(writer.into_vec(), vec![b'a', b'b', 0, 0, 0, b'c', b'd']);
}

// ---------- BytesReader ----------

#[test]
fn bytes_reader_copy_to_writer() {
    let mut reader = BytesReader::new(b"abcdef".to_vec());
    reader.skip(2).expect("skip");
    let mut dest = VecWriter::new();
    assert!(reader.copy_to(3, &mut dest).expect("copy"));
    dest.flush(FlushKind::FromObject).expect("flush");
    assert_eq!(dest.into_vec(), b"cde");
    assert_eq!(reader.pos(), 5);
}

// ---------- length-delimited framing ----------

#[test]
fn length_delimited_roundtrip() {
    use Sheaf::bytes::{read_length_delimited, write_length_delimited};
    let mut dest = VecWriter::new();
    write_length_delimited(&mut dest, b"alpha").expect("write");
    write_length_delimited(&mut dest, b"").expect("write");
    write_length_delimited(&mut dest, &vec![9u8; 300]).expect("write");
    let data = dest.into_vec();

    let mut reader = BytesReader::new(data);
    assert_eq!(
        read_length_delimited(&mut reader).expect("read"),
        Some(b"alpha".to_vec())
    );
    assert_eq!(
        read_length_delimited(&mut reader).expect("read"),
        Some(Vec::new())
    );
    assert_eq!(
        read_length_delimited(&mut reader).expect("read"),
        Some(vec![9u8; 300])
    );
    assert_eq!(read_length_delimited(&mut reader).expect("read"), None);
}

#[test]
fn length_delimited_truncated_frame_fails() {
    use Sheaf::bytes::{read_length_delimited, write_length_delimited};
    let mut dest = VecWriter::new();
    write_length_delimited(&mut dest, b"payload").expect("write");
    let mut data = dest.into_vec();
    data.truncate(data.len() - 2);
    let mut reader = BytesReader::new(data);
    let err = read_length_delimited(&mut reader).expect_err("truncated");
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
}

#[test]
fn bytes_reader_verify_end() {
    let mut reader = BytesReader::new(vec![1u8]);
    reader.consume(1);
    reader.verify_end().expect("at end");
    reader.seek(0).expect("seek");
    let err = reader.verify_end().expect_err("not at end");
    assert_eq!(Sheaf::status_code(&err), StatusCode::InvalidArgument);
}
