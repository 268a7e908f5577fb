//! decode — декодер транспонированного чанка.
//!
//! Разворачивает колонки обратно в записи. Выход пишется в backward-писатель
//! (записи идут в обратном порядке, поля — изнутри наружу), поэтому длины
//! вложенных сообщений известны к моменту записи их префикса. Под проекцией
//! бакеты распаковываются лениво и только до нужного буфера.

use anyhow::Result;
use std::collections::HashMap;

use crate::bytes::backward::{BackwardWriter, VecBackwardWriter};
use crate::bytes::bytes_reader::BytesReader;
use crate::bytes::reader::Reader;
use crate::compress::{uncompressed_size_of, CompressionType, Decompressor};
use crate::encoding::projection::{FieldProjection, IncludeType, IncludedField, ROOT_ID};
use crate::encoding::transpose::*;
use crate::error::Status;
use crate::varint::{parse_varint32, put_varint32, read_varint32, read_varint64, MAX_LEN_VARINT32};

/// Защитные пределы на поля заголовка (повреждённый вход не должен
/// приводить к гигантским аллокациям).
const MAX_STATE_MACHINE_SIZE: u32 = 1 << 20;
const MAX_BUFFERS: u32 = 1 << 20;

struct DataBucket {
    buffer_sizes: Vec<usize>,
    decompressor: Option<Decompressor<'static>>,
    /// Сжатые байты до первого обращения; потом переезжают в декомпрессор.
    compressed: Option<Vec<u8>>,
    buffers: Vec<BytesReader<Vec<u8>>>,
}

#[derive(Default)]
struct Context {
    compression: CompressionType,
    nodes: Vec<Node>,
    templates: Vec<NodeTemplate>,
    first_node: u32,
    projection_enabled: bool,
    include_fields: HashMap<(u32, u32), IncludedField>,
    // без проекции: все буферы распакованы заранее
    flat_buffers: Vec<BytesReader<Vec<u8>>>,
    // с проекцией: ленивые бакеты
    buckets: Vec<DataBucket>,
    bucket_of_buffer: Vec<u32>,
    first_buffer_in_bucket: Vec<u32>,
    /// Глобальный индекс буфера длин непротобуфных записей.
    nonproto_lengths: u32,
}

impl Context {
    /// Буфер по глобальному индексу; под проекцией лениво материализует
    /// префикс бакета до нужного буфера включительно.
    fn buffer_mut(&mut self, global: u32) -> Result<&mut BytesReader<Vec<u8>>> {
        if global == INVALID_INDEX {
            return Err(Status::invalid_argument("node has no data buffer").into());
        }
        if !self.projection_enabled {
            return Ok(&mut self.flat_buffers[global as usize]);
        }
        let bucket_index = self.bucket_of_buffer[global as usize] as usize;
        let within = (global - self.first_buffer_in_bucket[bucket_index]) as usize;
        let compression = self.compression;
        let bucket = &mut self.buckets[bucket_index];
        while within >= bucket.buffers.len() {
            if bucket.decompressor.is_none() {
                let compressed = bucket.compressed.take().unwrap_or_default();
                bucket.decompressor = Some(Decompressor::from_vec(compressed, compression)?);
                bucket.buffers.reserve(bucket.buffer_sizes.len());
            }
            let size = bucket.buffer_sizes[bucket.buffers.len()];
            let mut data = Vec::new();
            let dec = bucket.decompressor.as_mut().unwrap();
            if !dec.read(size, &mut data)? {
                return Err(Status::invalid_argument("reading buffer failed").into());
            }
            bucket.buffers.push(BytesReader::new(data));
            if bucket.buffers.len() == bucket.buffer_sizes.len() {
                // последний буфер бакета: сжатая копия больше не нужна
                let mut dec = bucket.decompressor.take().unwrap();
                dec.verify_end()?;
            }
        }
        Ok(&mut bucket.buffers[within])
    }
}

/// Развернуть нагрузку транспонированного чанка.
pub fn decode(
    payload: &[u8],
    num_records: u64,
    decoded_data_size: u64,
    projection: &FieldProjection,
) -> Result<(Vec<u8>, Vec<usize>)> {
    let mut src = BytesReader::new(payload);
    let mut ctx = Context::default();
    parse(&mut ctx, &mut src, projection)?;
    let mut transitions = Decompressor::from_reader(&mut src, ctx.compression)?;
    let size_hint = decoded_data_size.min(1 << 22) as usize;
    let mut dest = VecBackwardWriter::with_size_hint(size_hint).with_limit(decoded_data_size);
    let limits = run(&mut ctx, &mut transitions, &mut dest, num_records)?;
    transitions.verify_end()?;
    let values = dest.into_vec();
    if projection.includes_all() && values.len() as u64 != decoded_data_size {
        return Err(Status::invalid_argument("decoded data size smaller than expected").into());
    }
    Ok((values, limits))
}

fn parse(ctx: &mut Context, src: &mut BytesReader<&[u8]>, projection: &FieldProjection) -> Result<()> {
    ctx.projection_enabled = !projection.includes_all();
    if ctx.projection_enabled {
        ctx.include_fields = projection.build_tree()?;
    }
    ctx.nonproto_lengths = INVALID_INDEX;

    let compression_byte = src
        .read_byte()?
        .ok_or_else(|| Status::invalid_argument("reading compression type failed"))?;
    ctx.compression = CompressionType::from_byte(compression_byte).ok_or_else(|| {
        Status::invalid_argument(format!("unknown compression type: 0x{:02x}", compression_byte))
    })?;

    let header_size = read_varint64(src)?
        .ok_or_else(|| Status::invalid_argument("reading header size failed"))?;
    let mut header_bytes = Vec::new();
    if !src.read(header_size as usize, &mut header_bytes)? {
        return Err(Status::invalid_argument("reading header failed").into());
    }
    let mut header = Decompressor::from_vec(header_bytes, ctx.compression)?;

    let num_buffers = if ctx.projection_enabled {
        parse_buffers_for_filtering(ctx, &mut header, src)?
    } else {
        parse_buffers(ctx, &mut header, src)?
    };

    let state_machine_size = read_varint32(&mut header)?
        .ok_or_else(|| Status::invalid_argument("reading state machine size failed"))?;
    if state_machine_size > MAX_STATE_MACHINE_SIZE {
        return Err(Status::resource_exhausted(format!(
            "state machine too large: {}",
            state_machine_size
        ))
        .into());
    }
    let size = state_machine_size as usize;

    let mut tags = Vec::with_capacity(size);
    for _ in 0..size {
        let tag = read_varint32(&mut header)?
            .ok_or_else(|| Status::invalid_argument("reading field tag failed"))?;
        tags.push(tag);
    }
    let mut next_indices = Vec::with_capacity(size);
    for _ in 0..size {
        let next = read_varint32(&mut header)?
            .ok_or_else(|| Status::invalid_argument("reading next node index failed"))?;
        next_indices.push(next);
    }
    let num_subtypes = tags
        .iter()
        .filter(|&&t| valid_tag(t) && has_subtype(t))
        .count();
    let mut subtypes = Vec::new();
    if !header.read(num_subtypes, &mut subtypes)? {
        return Err(Status::invalid_argument("reading subtypes failed").into());
    }

    ctx.nodes = vec![Node::default(); size + GUARD_NODES];
    if ctx.projection_enabled {
        ctx.templates = vec![
            NodeTemplate {
                tag: 0,
                subtype: 0,
                tag_len: 0,
                buffer: INVALID_INDEX,
            };
            size
        ];
    }

    let mut has_nonproto = false;
    let mut subtype_index = 0usize;
    for i in 0..size {
        let raw_tag = tags[i];
        let mut node = Node {
            callback: Callback::NoOp,
            ..Node::default()
        };
        match raw_tag {
            MSG_ID_NO_OP => node.callback = Callback::NoOp,
            MSG_ID_NON_PROTO => {
                node.callback = Callback::NonProto;
                let buffer_index = read_varint32(&mut header)?
                    .ok_or_else(|| Status::invalid_argument("reading buffer index failed"))?;
                if buffer_index >= num_buffers {
                    return Err(Status::invalid_argument("buffer index too large").into());
                }
                node.buffer = buffer_index;
                has_nonproto = true;
            }
            MSG_ID_START_OF_MESSAGE => node.callback = Callback::MessageStart,
            MSG_ID_START_OF_SUBMESSAGE => {
                if ctx.projection_enabled {
                    ctx.templates[i].tag = MSG_ID_START_OF_SUBMESSAGE;
                    node.template = i as u32;
                    node.callback = Callback::Select;
                } else {
                    node.callback = Callback::SubmessageStart;
                }
            }
            _ => {
                let mut tag = raw_tag;
                let mut subtype = SUBTYPE_TRIVIAL;
                if tag_wire_type(tag) == WIRE_SUBMESSAGE {
                    tag -= WIRE_SUBMESSAGE - WIRE_LENGTH_DELIMITED;
                    subtype = SUBTYPE_LENGTH_DELIMITED_END_OF_SUBMESSAGE;
                }
                if !valid_tag(tag) {
                    return Err(Status::invalid_argument("invalid tag").into());
                }
                let tag_len = put_varint32(&mut node.tag_data.bytes, tag);
                if has_subtype(tag) {
                    subtype = subtypes[subtype_index];
                    subtype_index += 1;
                }
                let buffer_index = if has_data_buffer(tag, subtype) {
                    let index = read_varint32(&mut header)?
                        .ok_or_else(|| Status::invalid_argument("reading buffer index failed"))?;
                    if index >= num_buffers {
                        return Err(Status::invalid_argument("buffer index too large").into());
                    }
                    index
                } else {
                    INVALID_INDEX
                };
                if ctx.projection_enabled {
                    ctx.templates[i] = NodeTemplate {
                        tag,
                        subtype,
                        tag_len: tag_len as u8,
                        buffer: buffer_index,
                    };
                    node.template = i as u32;
                    node.callback = Callback::Select;
                } else {
                    node.buffer = buffer_index;
                    node.callback =
                        callback_for(FieldIncluded::Yes, tag, subtype, tag_len as u8, false)
                            .ok_or_else(|| Status::invalid_argument("invalid node"))?;
                }
                // байт за тегом: вшитое значение либо ноль
                if tag_wire_type(tag) == WIRE_VARINT && subtype >= SUBTYPE_VARINT_INLINE_0 {
                    node.tag_data.bytes[tag_len] = subtype - SUBTYPE_VARINT_INLINE_0;
                } else {
                    node.tag_data.bytes[tag_len] = 0;
                }
                node.tag_data.len = tag_len as u8;
            }
        }
        let mut next = next_indices[i];
        if next >= state_machine_size {
            next -= state_machine_size;
            node.implicit = true;
        }
        if next >= state_machine_size {
            return Err(Status::invalid_argument("node index too large").into());
        }
        node.next = next;
        ctx.nodes[i] = node;
    }

    if has_nonproto {
        // буфер длин непротобуфных записей — последний
        if num_buffers == 0 {
            return Err(
                Status::invalid_argument("missing buffer for non-proto records").into()
            );
        }
        ctx.nonproto_lengths = num_buffers - 1;
    }

    let first_node = read_varint32(&mut header)?
        .ok_or_else(|| Status::invalid_argument("reading first node index failed"))?;
    if first_node >= state_machine_size {
        return Err(Status::invalid_argument("first node index too large").into());
    }
    ctx.first_node = first_node;

    if contains_implicit_loop(&ctx.nodes, size) {
        return Err(Status::invalid_argument("nodes contain an implicit loop").into());
    }

    header.verify_end()?;
    Ok(())
}

/// Без проекции: распаковать все бакеты и материализовать буферы заранее.
fn parse_buffers(
    ctx: &mut Context,
    header: &mut Decompressor<'static>,
    src: &mut BytesReader<&[u8]>,
) -> Result<u32> {
    let num_buckets = read_varint32(header)?
        .ok_or_else(|| Status::invalid_argument("reading number of buckets failed"))?;
    let num_buffers = read_varint32(header)?
        .ok_or_else(|| Status::invalid_argument("reading number of buffers failed"))?;
    if num_buffers > MAX_BUFFERS || num_buckets > num_buffers.max(1) {
        return Err(Status::resource_exhausted("too many buffers").into());
    }
    if num_buckets == 0 {
        if num_buffers != 0 {
            return Err(Status::invalid_argument("too few buckets").into());
        }
        return Ok(0);
    }
    let mut bucket_decompressors = Vec::with_capacity(num_buckets as usize);
    for _ in 0..num_buckets {
        let bucket_length = read_varint64(header)?
            .ok_or_else(|| Status::invalid_argument("reading bucket length failed"))?;
        let mut bucket = Vec::new();
        if !src.read(bucket_length as usize, &mut bucket)? {
            return Err(Status::invalid_argument("reading bucket failed").into());
        }
        bucket_decompressors.push(Decompressor::from_vec(bucket, ctx.compression)?);
    }

    let mut bucket_index = 0usize;
    ctx.flat_buffers.reserve(num_buffers as usize);
    for _ in 0..num_buffers {
        let buffer_length = read_varint64(header)?
            .ok_or_else(|| Status::invalid_argument("reading buffer length failed"))?;
        let mut buffer = Vec::new();
        if !bucket_decompressors[bucket_index].read(buffer_length as usize, &mut buffer)? {
            return Err(Status::invalid_argument("reading buffer failed").into());
        }
        ctx.flat_buffers.push(BytesReader::new(buffer));
        while !bucket_decompressors[bucket_index].pull(1)?
            && bucket_index + 1 < num_buckets as usize
        {
            bucket_decompressors[bucket_index].verify_end()?;
            bucket_index += 1;
        }
    }
    if bucket_index + 1 < num_buckets as usize {
        return Err(Status::invalid_argument("too few buckets").into());
    }
    bucket_decompressors[bucket_index].verify_end()?;
    Ok(num_buffers)
}

/// С проекцией: бакеты остаются сжатыми, раскладка буферов — из длин.
fn parse_buffers_for_filtering(
    ctx: &mut Context,
    header: &mut Decompressor<'static>,
    src: &mut BytesReader<&[u8]>,
) -> Result<u32> {
    let num_buckets = read_varint32(header)?
        .ok_or_else(|| Status::invalid_argument("reading number of buckets failed"))?;
    let num_buffers = read_varint32(header)?
        .ok_or_else(|| Status::invalid_argument("reading number of buffers failed"))?;
    if num_buffers > MAX_BUFFERS || num_buckets > num_buffers.max(1) {
        return Err(Status::resource_exhausted("too many buffers").into());
    }
    if num_buckets == 0 {
        if num_buffers != 0 {
            return Err(Status::invalid_argument("too few buckets").into());
        }
        return Ok(0);
    }
    for _ in 0..num_buckets {
        let bucket_length = read_varint64(header)?
            .ok_or_else(|| Status::invalid_argument("reading bucket length failed"))?;
        let mut compressed = Vec::new();
        if !src.read(bucket_length as usize, &mut compressed)? {
            return Err(Status::invalid_argument("reading bucket failed").into());
        }
        ctx.buckets.push(DataBucket {
            buffer_sizes: Vec::new(),
            decompressor: None,
            compressed: Some(compressed),
            buffers: Vec::new(),
        });
    }

    let mut bucket_index = 0usize;
    ctx.first_buffer_in_bucket.push(0);
    let mut remaining = uncompressed_size_of(
        ctx.buckets[0].compressed.as_deref().unwrap_or(&[]),
        ctx.compression,
    )
    .ok_or_else(|| Status::invalid_argument("reading uncompressed size failed"))?;
    for buffer_index in 0..num_buffers {
        let buffer_length = read_varint64(header)?
            .ok_or_else(|| Status::invalid_argument("reading buffer length failed"))?;
        if buffer_length > remaining {
            return Err(Status::invalid_argument("buffer does not fit in bucket").into());
        }
        ctx.buckets[bucket_index]
            .buffer_sizes
            .push(buffer_length as usize);
        remaining -= buffer_length;
        ctx.bucket_of_buffer.push(bucket_index as u32);
        while remaining == 0 && bucket_index + 1 < num_buckets as usize {
            bucket_index += 1;
            ctx.first_buffer_in_bucket.push(buffer_index + 1);
            remaining = uncompressed_size_of(
                ctx.buckets[bucket_index].compressed.as_deref().unwrap_or(&[]),
                ctx.compression,
            )
            .ok_or_else(|| Status::invalid_argument("reading uncompressed size failed"))?;
        }
    }
    if bucket_index + 1 < num_buckets as usize {
        return Err(Status::invalid_argument("too few buckets").into());
    }
    if remaining > 0 {
        return Err(Status::invalid_argument("end of data expected").into());
    }
    Ok(num_buffers)
}

/// Цепочки неявных переходов не должны зацикливаться, иначе главный цикл
/// не завершится. Двухцветный обход с идентификаторами цепочек.
fn contains_implicit_loop(nodes: &[Node], size: usize) -> bool {
    let mut loop_ids = vec![0usize; size];
    let mut next_loop_id = 1usize;
    for i in 0..size {
        if loop_ids[i] != 0 {
            continue;
        }
        loop_ids[i] = next_loop_id;
        let mut j = i;
        while nodes[j].implicit {
            j = nodes[j].next as usize;
            if j >= size {
                break;
            }
            if loop_ids[j] == next_loop_id {
                return true;
            }
            if loop_ids[j] != 0 {
                break;
            }
            loop_ids[j] = next_loop_id;
        }
        next_loop_id += 1;
    }
    false
}

fn run(
    ctx: &mut Context,
    transitions: &mut Decompressor<'_>,
    dest: &mut VecBackwardWriter,
    num_records: u64,
) -> Result<Vec<usize>> {
    let mut limits: Vec<usize> = Vec::with_capacity(num_records.min(1 << 20) as usize);
    let mut submessage_stack: Vec<(u64, TagData)> = Vec::with_capacity(16);
    let mut skipped_level: u32 = 0;
    let mut cur = ctx.first_node as usize;
    let mut num_iters: u32 = if ctx.nodes[cur].implicit { 1 } else { 0 };

    'main: loop {
        let node = ctx.nodes[cur];
        match node.callback {
            Callback::Select => {
                set_callback_type(ctx, skipped_level, &submessage_stack, cur)?;
                continue 'main;
            }
            Callback::SkippedSubmessageEnd => {
                skipped_level += 1;
            }
            Callback::SkippedSubmessageStart => {
                if skipped_level == 0 {
                    return Err(Status::invalid_argument(
                        "skipped submessage stack underflow",
                    )
                    .into());
                }
                skipped_level -= 1;
            }
            Callback::SubmessageEnd => {
                submessage_stack.push((dest.pos(), node.tag_data));
            }
            Callback::SubmessageStart => {
                let (end_pos, tag_data) = submessage_stack
                    .pop()
                    .ok_or_else(|| Status::invalid_argument("submessage stack underflow"))?;
                debug_assert!(dest.pos() >= end_pos);
                let length = dest.pos() - end_pos;
                if length > u32::MAX as u64 {
                    return Err(Status::invalid_argument("message too large").into());
                }
                dest.prepend_varint32(length as u32)?;
                dest.prepend(&tag_data.bytes[..tag_data.len as usize])?;
            }
            Callback::CopyTag { tag_len } => {
                dest.prepend(&node.tag_data.bytes[..tag_len as usize])?;
            }
            Callback::Varint { tag_len, len } => {
                let t = tag_len as usize;
                let k = len as usize;
                let buf = dest.prepend_buf(t + k)?;
                let reader = ctx.buffer_mut(node.buffer)?;
                if !reader.read_slice(&mut buf[t..])? {
                    return Err(Status::invalid_argument("reading varint field failed").into());
                }
                for b in buf[t..t + k - 1].iter_mut() {
                    *b |= 0x80;
                }
                buf[..t].copy_from_slice(&node.tag_data.bytes[..t]);
            }
            Callback::Fixed32 { tag_len } => {
                fixed_callback(ctx, dest, &node, tag_len as usize, 4)?;
            }
            Callback::Fixed64 { tag_len } => {
                fixed_callback(ctx, dest, &node, tag_len as usize, 8)?;
            }
            Callback::Fixed32Existence { tag_len } => {
                fixed_existence_callback(dest, &node, tag_len as usize, 4)?;
            }
            Callback::Fixed64Existence { tag_len } => {
                fixed_existence_callback(dest, &node, tag_len as usize, 8)?;
            }
            Callback::String { tag_len } => {
                let t = tag_len as usize;
                let reader = ctx.buffer_mut(node.buffer)?;
                let _ = reader.pull(MAX_LEN_VARINT32)?;
                let (length, length_len) = parse_varint32(reader.peek())
                    .ok_or_else(|| Status::invalid_argument("reading string length failed"))?;
                if length as u64 + length_len as u64 > u32::MAX as u64 {
                    return Err(Status::invalid_argument("string length overflow").into());
                }
                let total = length as usize + length_len;
                let buf = dest.prepend_buf(total)?;
                let reader = ctx.buffer_mut(node.buffer)?;
                if !reader.read_slice(buf)? {
                    return Err(Status::invalid_argument("reading string field failed").into());
                }
                dest.prepend(&node.tag_data.bytes[..t])?;
            }
            Callback::NonProto => {
                let nonproto_lengths = ctx.nonproto_lengths;
                let length = {
                    let lengths = ctx.buffer_mut(nonproto_lengths)?;
                    read_varint32(lengths)?.ok_or_else(|| {
                        Status::invalid_argument("reading non-proto record length failed")
                    })?
                };
                let buf = dest.prepend_buf(length as usize)?;
                let reader = ctx.buffer_mut(node.buffer)?;
                if !reader.read_slice(buf)? {
                    return Err(
                        Status::invalid_argument("reading non-proto record failed").into()
                    );
                }
                // непротобуфная запись сама является границей записи
                message_start(&submessage_stack, &mut limits, dest, num_records)?;
            }
            Callback::MessageStart => {
                message_start(&submessage_stack, &mut limits, dest, num_records)?;
            }
            Callback::NoOp => {}
            Callback::StartProjectionGroup { tag_len } => {
                if submessage_stack.pop().is_none() {
                    return Err(Status::invalid_argument("submessage stack underflow").into());
                }
                dest.prepend(&node.tag_data.bytes[..tag_len as usize])?;
            }
            Callback::EndProjectionGroup { tag_len } => {
                submessage_stack.push((dest.pos(), node.tag_data));
                dest.prepend(&node.tag_data.bytes[..tag_len as usize])?;
            }
            Callback::Failure => {
                return Err(Status::invalid_argument("invalid node index").into());
            }
        }

        // переход
        cur = node.next as usize;
        if num_iters == 0 {
            let byte = match transitions.read_byte()? {
                Some(b) => b,
                None => break 'main,
            };
            cur += (byte >> 2) as usize;
            num_iters = (byte & 3) as u32;
            if ctx.nodes[cur].implicit {
                num_iters += 1;
            }
        } else if !ctx.nodes[cur].implicit {
            num_iters -= 1;
        }
    }

    if !submessage_stack.is_empty() {
        return Err(Status::invalid_argument("submessages still open").into());
    }
    if skipped_level != 0 {
        return Err(Status::invalid_argument("skipped submessages still open").into());
    }
    if limits.len() as u64 != num_records {
        return Err(Status::invalid_argument("too few records").into());
    }
    let total = limits.last().copied().unwrap_or(0);
    if total as u64 != dest.pos() {
        return Err(Status::invalid_argument("unfinished message").into());
    }

    // Развернуть limits и дополнить до размера: {40,70,90,100} -> {10,30,60,100}.
    let n = limits.len();
    if n > 1 {
        let mut lo = 0usize;
        let mut hi = n - 1;
        while lo < hi {
            hi -= 1;
            let tmp = total - limits[lo];
            limits[lo] = total - limits[hi];
            limits[hi] = tmp;
            lo += 1;
        }
    }
    Ok(limits)
}

fn message_start(
    submessage_stack: &[(u64, TagData)],
    limits: &mut Vec<usize>,
    dest: &VecBackwardWriter,
    num_records: u64,
) -> Result<()> {
    if !submessage_stack.is_empty() {
        return Err(Status::invalid_argument("submessages still open").into());
    }
    if limits.len() as u64 == num_records {
        return Err(Status::invalid_argument("too many records").into());
    }
    limits.push(dest.pos() as usize);
    Ok(())
}

fn fixed_callback(
    ctx: &mut Context,
    dest: &mut VecBackwardWriter,
    node: &Node,
    tag_len: usize,
    data_len: usize,
) -> Result<()> {
    let buf = dest.prepend_buf(tag_len + data_len)?;
    let reader = ctx.buffer_mut(node.buffer)?;
    if !reader.read_slice(&mut buf[tag_len..])? {
        return Err(Status::invalid_argument("reading fixed field failed").into());
    }
    buf[..tag_len].copy_from_slice(&node.tag_data.bytes[..tag_len]);
    Ok(())
}

fn fixed_existence_callback(
    dest: &mut VecBackwardWriter,
    node: &Node,
    tag_len: usize,
    data_len: usize,
) -> Result<()> {
    let buf = dest.prepend_buf(tag_len + data_len)?;
    for b in buf[tag_len..].iter_mut() {
        *b = 0;
    }
    buf[..tag_len].copy_from_slice(&node.tag_data.bytes[..tag_len]);
    Ok(())
}

/// Разрешить Select-узел по текущему пути в стеке вложенных сообщений.
fn set_callback_type(
    ctx: &mut Context,
    skipped_level: u32,
    submessage_stack: &[(u64, TagData)],
    index: usize,
) -> Result<()> {
    let node = ctx.nodes[index];
    let is_implicit = node.implicit;
    let tmpl = ctx.templates[node.template as usize];
    let mut resolved = node;
    if tmpl.tag == MSG_ID_START_OF_SUBMESSAGE {
        resolved.callback = if skipped_level > 0 {
            Callback::SkippedSubmessageStart
        } else {
            Callback::SubmessageStart
        };
    } else {
        let mut field_included = FieldIncluded::No;
        let mut field_id = ROOT_ID;
        if skipped_level == 0 {
            field_included = FieldIncluded::ExistenceOnly;
            for (_, tag_data) in submessage_stack {
                let (tag, _) = parse_varint32(&tag_data.bytes)
                    .ok_or_else(|| Status::invalid_argument("invalid tag on stack"))?;
                match ctx.include_fields.get(&(field_id, tag_field_number(tag))) {
                    None => {
                        field_included = FieldIncluded::No;
                        break;
                    }
                    Some(f) => {
                        if f.include_type == IncludeType::Fully {
                            field_included = FieldIncluded::Yes;
                            break;
                        }
                        field_id = f.field_id;
                    }
                }
            }
        }
        // Для start-group парный end-group либо уже в стеке (и проверен выше),
        // либо был пропущен и skipped_level > 0.
        let start_group_tag = tag_wire_type(tmpl.tag) == WIRE_START_GROUP;
        if !start_group_tag && field_included == FieldIncluded::ExistenceOnly {
            match ctx
                .include_fields
                .get(&(field_id, tag_field_number(tmpl.tag)))
            {
                None => field_included = FieldIncluded::No,
                Some(f) => {
                    if f.include_type == IncludeType::Fully
                        || f.include_type == IncludeType::ChildOnly
                    {
                        field_included = FieldIncluded::Yes;
                    }
                }
            }
        }
        resolved.buffer = if tmpl.buffer != INVALID_INDEX && field_included == FieldIncluded::Yes {
            tmpl.buffer
        } else {
            INVALID_INDEX
        };
        resolved.callback =
            callback_for(field_included, tmpl.tag, tmpl.subtype, tmpl.tag_len, true)
                .ok_or_else(|| Status::invalid_argument("invalid node"))?;
        if field_included == FieldIncluded::ExistenceOnly
            && tag_wire_type(tmpl.tag) == WIRE_VARINT
        {
            // за тегом шёл подтип, теперь должен идти ноль
            resolved.tag_data.bytes[tmpl.tag_len as usize] = 0;
        }
    }
    resolved.implicit = is_implicit;
    ctx.nodes[index] = resolved;
    Ok(())
}
