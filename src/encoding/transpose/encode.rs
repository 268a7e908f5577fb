//! encode — транспонирующий кодер.
//!
//! Каждая запись сканируется wire-сканером; валидный протобуф раскладывается
//! в дерево элементов, length-delimited поля с канонической длиной
//! пробуются как вложенные сообщения. Узлы машины состояний интернируются
//! по пути поля (путь + тег + подтип), значения уходят в буфер своего узла.
//! Однобайтовые варинты вшиваются в подтип и буфера не занимают.
//!
//! Поток переходов пишется в порядке декодирования: записи с конца, поля
//! каждой записи изнутри наружу. Шаг к node.next у стабильных узлов
//! помечается неявным и байта не занимает; дальние цели адресуются через
//! NoOp-роутеры двумя байтами.

use anyhow::Result;
use std::collections::HashMap;

use crate::chunk::{Chunk, ChunkType};
use crate::compress::{Compressor, CompressorOptions};
use crate::config;
use crate::encoding::transpose::*;
use crate::encoding::ChunkEncoder;
use crate::error::Status;
use crate::varint::{length_varint32, parse_varint32, write_varint32, write_varint64};

/// Предел вложенности при распознавании подсообщений.
const MAX_RECURSION: usize = 32;

/// Адресация двумя байтами покрывает 64 + 64*64 узлов.
const MAX_NODES: usize = 64 * 64 + 64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SymbolKey {
    MessageStart,
    NonProto,
    SubmessageStart { path: u32 },
    SubmessageEnd { path: u32, field: u32 },
    Leaf { path: u32, tag: u32, subtype: u8 },
}

impl SymbolKey {
    /// Тег символа в заголовке чанка.
    fn serialized_tag(&self) -> u32 {
        match self {
            SymbolKey::MessageStart => MSG_ID_START_OF_MESSAGE,
            SymbolKey::NonProto => MSG_ID_NON_PROTO,
            SymbolKey::SubmessageStart { .. } => MSG_ID_START_OF_SUBMESSAGE,
            SymbolKey::SubmessageEnd { field, .. } => make_tag(*field, WIRE_SUBMESSAGE),
            SymbolKey::Leaf { tag, .. } => *tag,
        }
    }

    fn subtype(&self) -> Option<u8> {
        match self {
            SymbolKey::Leaf { tag, subtype, .. } if has_subtype(*tag) => Some(*subtype),
            _ => None,
        }
    }

    fn has_buffer(&self) -> bool {
        match self {
            SymbolKey::NonProto => true,
            SymbolKey::Leaf { tag, subtype, .. } => has_data_buffer(*tag, *subtype),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Event {
    sym: u32,
    value_begin: usize,
    value_len: usize,
}

enum RecordRepr {
    /// События в прямом порядке + копия байтов значений.
    Proto { events: Vec<Event>, values: Vec<u8> },
    NonProto(Vec<u8>),
}

/// Разобранный элемент wire-потока.
enum Elem<'r> {
    Varint { tag: u32, bytes: &'r [u8] },
    Fixed32 { tag: u32, bytes: &'r [u8] },
    Fixed64 { tag: u32, bytes: &'r [u8] },
    /// Длина + байты (копируются в буфер как есть).
    String { tag: u32, raw: &'r [u8] },
    Submessage { tag: u32, field: u32, elems: Vec<Elem<'r>> },
}

pub struct TransposeEncoder {
    compression: CompressorOptions,
    bucket_size: usize,
    paths: HashMap<(u32, u32), u32>,
    next_path_id: u32,
    symbols: HashMap<SymbolKey, u32>,
    symbol_keys: Vec<SymbolKey>,
    records: Vec<RecordRepr>,
    num_records: u64,
    decoded_data_size: u64,
}

impl TransposeEncoder {
    pub fn new(compression: CompressorOptions) -> Self {
        let cfg = config::global();
        let bucket_size =
            ((cfg.chunk_size as f64 * cfg.bucket_fraction) as usize).max(1);
        Self::with_bucket_size(compression, bucket_size)
    }

    pub fn with_bucket_size(compression: CompressorOptions, bucket_size: usize) -> Self {
        // final_size относится к единственному потоку, не к потокам чанка
        let compression = compression.with_final_size(None);
        Self {
            compression,
            bucket_size: bucket_size.max(1),
            paths: HashMap::new(),
            next_path_id: 1, // 0 — корень
            symbols: HashMap::new(),
            symbol_keys: Vec::new(),
            records: Vec::new(),
            num_records: 0,
            decoded_data_size: 0,
        }
    }

    fn intern_path(&mut self, parent: u32, field: u32) -> u32 {
        *self.paths.entry((parent, field)).or_insert_with(|| {
            let id = self.next_path_id;
            self.next_path_id += 1;
            id
        })
    }

    fn intern(&mut self, key: SymbolKey) -> u32 {
        if let Some(&id) = self.symbols.get(&key) {
            return id;
        }
        let id = self.symbol_keys.len() as u32;
        self.symbols.insert(key.clone(), id);
        self.symbol_keys.push(key);
        id
    }

    /// Разобрать байты как протобуф-сообщение. None — не протобуф
    /// (группы, неканонические теги, оборванное поле).
    fn parse_message<'r>(data: &'r [u8], depth: usize) -> Option<Vec<Elem<'r>>> {
        let mut elems = Vec::new();
        let mut pos = 0usize;
        while pos < data.len() {
            let (tag, tag_len) = parse_varint32(&data[pos..])?;
            if tag_len != length_varint32(tag) || !valid_tag(tag) {
                return None;
            }
            let wt = tag_wire_type(tag);
            if wt == WIRE_START_GROUP || wt == WIRE_END_GROUP {
                return None;
            }
            pos += tag_len;
            match wt {
                WIRE_VARINT => {
                    let start = pos;
                    loop {
                        if pos >= data.len() || pos - start >= 10 {
                            return None;
                        }
                        let byte = data[pos];
                        if pos - start == 9 && byte > 1 {
                            return None;
                        }
                        pos += 1;
                        if byte & 0x80 == 0 {
                            break;
                        }
                    }
                    elems.push(Elem::Varint {
                        tag,
                        bytes: &data[start..pos],
                    });
                }
                WIRE_FIXED32 => {
                    if pos + 4 > data.len() {
                        return None;
                    }
                    elems.push(Elem::Fixed32 {
                        tag,
                        bytes: &data[pos..pos + 4],
                    });
                    pos += 4;
                }
                WIRE_FIXED64 => {
                    if pos + 8 > data.len() {
                        return None;
                    }
                    elems.push(Elem::Fixed64 {
                        tag,
                        bytes: &data[pos..pos + 8],
                    });
                    pos += 8;
                }
                WIRE_LENGTH_DELIMITED => {
                    let (len, len_len) = parse_varint32(&data[pos..])?;
                    let total = len_len.checked_add(len as usize)?;
                    if pos + total > data.len() {
                        return None;
                    }
                    let content = &data[pos + len_len..pos + total];
                    // подсообщение распознаётся только при канонической длине:
                    // декодер перекодирует её минимальным варинтом
                    let minimal = len_len == length_varint32(len);
                    let sub = if minimal && depth < MAX_RECURSION {
                        Self::parse_message(content, depth + 1)
                    } else {
                        None
                    };
                    match sub {
                        Some(sub_elems) => elems.push(Elem::Submessage {
                            tag,
                            field: tag_field_number(tag),
                            elems: sub_elems,
                        }),
                        None => elems.push(Elem::String {
                            tag,
                            raw: &data[pos..pos + total],
                        }),
                    }
                    pos += total;
                }
                _ => return None,
            }
        }
        Some(elems)
    }

    fn emit(
        &mut self,
        elems: &[Elem<'_>],
        path: u32,
        events: &mut Vec<Event>,
        values: &mut Vec<u8>,
    ) {
        for elem in elems {
            match elem {
                Elem::Varint { tag, bytes } => {
                    if bytes.len() == 1 && bytes[0] <= 0x7f {
                        // однобайтовое значение вшивается в подтип
                        let sym = self.intern(SymbolKey::Leaf {
                            path,
                            tag: *tag,
                            subtype: SUBTYPE_VARINT_INLINE_0 + bytes[0],
                        });
                        events.push(Event {
                            sym,
                            value_begin: values.len(),
                            value_len: 0,
                        });
                    } else {
                        let sym = self.intern(SymbolKey::Leaf {
                            path,
                            tag: *tag,
                            subtype: SUBTYPE_VARINT_1 + (bytes.len() - 1) as u8,
                        });
                        let begin = values.len();
                        values.extend_from_slice(bytes);
                        events.push(Event {
                            sym,
                            value_begin: begin,
                            value_len: bytes.len(),
                        });
                    }
                }
                Elem::Fixed32 { tag, bytes } | Elem::Fixed64 { tag, bytes } => {
                    let sym = self.intern(SymbolKey::Leaf {
                        path,
                        tag: *tag,
                        subtype: SUBTYPE_TRIVIAL,
                    });
                    let begin = values.len();
                    values.extend_from_slice(bytes);
                    events.push(Event {
                        sym,
                        value_begin: begin,
                        value_len: bytes.len(),
                    });
                }
                Elem::String { tag, raw } => {
                    let sym = self.intern(SymbolKey::Leaf {
                        path,
                        tag: *tag,
                        subtype: SUBTYPE_LENGTH_DELIMITED_STRING,
                    });
                    let begin = values.len();
                    values.extend_from_slice(raw);
                    events.push(Event {
                        sym,
                        value_begin: begin,
                        value_len: raw.len(),
                    });
                }
                Elem::Submessage { tag, field, elems } => {
                    let child = self.intern_path(path, *field);
                    let start = self.intern(SymbolKey::SubmessageStart { path: child });
                    events.push(Event {
                        sym: start,
                        value_begin: values.len(),
                        value_len: 0,
                    });
                    self.emit(elems, child, events, values);
                    // тег конца хранит length-delimited форму исходного тега
                    let end = self.intern(SymbolKey::SubmessageEnd {
                        path: child,
                        field: tag_field_number(*tag),
                    });
                    events.push(Event {
                        sym: end,
                        value_begin: values.len(),
                        value_len: 0,
                    });
                }
            }
        }
    }
}

impl ChunkEncoder for TransposeEncoder {
    fn add_record(&mut self, record: &[u8]) -> Result<()> {
        match Self::parse_message(record, 0) {
            Some(elems) => {
                let mut events = Vec::new();
                let mut values = Vec::new();
                self.emit(&elems, 0, &mut events, &mut values);
                self.intern(SymbolKey::MessageStart);
                self.records.push(RecordRepr::Proto { events, values });
            }
            None => {
                self.intern(SymbolKey::NonProto);
                self.records.push(RecordRepr::NonProto(record.to_vec()));
            }
        }
        self.num_records += 1;
        self.decoded_data_size += record.len() as u64;
        Ok(())
    }

    fn num_records(&self) -> u64 {
        self.num_records
    }

    fn decoded_data_size(&self) -> u64 {
        self.decoded_data_size
    }

    fn encode(&mut self) -> Result<Chunk> {
        // --- символьная последовательность в порядке декодирования ---
        let leaf_count = self.symbol_keys.len().max(1);
        let mut seq: Vec<u32> = Vec::new();
        let mut sym_values: Vec<Vec<u8>> = vec![Vec::new(); self.symbol_keys.len()];
        let mut nonproto_lengths: Vec<u8> = Vec::new();
        let msg_start = self.symbols.get(&SymbolKey::MessageStart).copied();
        let nonproto = self.symbols.get(&SymbolKey::NonProto).copied();
        for record in self.records.iter().rev() {
            match record {
                RecordRepr::Proto { events, values } => {
                    for event in events.iter().rev() {
                        seq.push(event.sym);
                        if event.value_len > 0 {
                            sym_values[event.sym as usize].extend_from_slice(
                                &values[event.value_begin..event.value_begin + event.value_len],
                            );
                        }
                    }
                    seq.push(msg_start.expect("message-start symbol interned"));
                }
                RecordRepr::NonProto(bytes) => {
                    let sym = nonproto.expect("non-proto symbol interned");
                    seq.push(sym);
                    sym_values[sym as usize].extend_from_slice(bytes);
                    write_varint32(&mut nonproto_lengths, bytes.len() as u32);
                }
            }
        }

        // --- раскладка узлов: роутеры, затем листья ---
        let routers = if leaf_count <= 64 {
            0
        } else {
            (leaf_count - 64 + 62) / 63
        };
        let total_nodes = leaf_count + routers;
        if total_nodes > MAX_NODES {
            return Err(Status::resource_exhausted(format!(
                "too many state machine nodes: {}",
                total_nodes
            ))
            .into());
        }
        let final_index = |sym: u32| -> usize { routers + sym as usize };

        // --- преемники, базовые переходы, неявные узлы ---
        struct Successors {
            min: usize,
            max: usize,
            single: Option<usize>,
            any: bool,
        }
        let mut succ: Vec<Successors> = (0..total_nodes)
            .map(|_| Successors {
                min: usize::MAX,
                max: 0,
                single: None,
                any: false,
            })
            .collect();
        for pair in seq.windows(2) {
            let from = final_index(pair[0]);
            let to = final_index(pair[1]);
            let s = &mut succ[from];
            if !s.any {
                s.any = true;
                s.single = Some(to);
            } else if s.single != Some(to) {
                s.single = None;
            }
            s.min = s.min.min(to);
            s.max = s.max.max(to);
        }
        let last_node = seq.last().map(|&s| final_index(s));

        let mut next: Vec<usize> = vec![0; total_nodes];
        let mut implicit: Vec<bool> = vec![false; total_nodes];
        for j in 0..routers {
            next[j] = 64 * (j + 1);
        }
        for sym in 0..leaf_count {
            let i = routers + sym;
            let s = &succ[i];
            if !s.any {
                next[i] = 0;
                continue;
            }
            next[i] = if s.max - s.min <= 63 { s.min } else { 0 };
            if let Some(single) = s.single {
                if next[i] == single && Some(i) != last_node {
                    implicit[i] = true;
                }
            }
        }

        // --- поток переходов ---
        let mut transition_bytes: Vec<u8> = Vec::new();
        for pair in seq.windows(2) {
            let from = final_index(pair[0]);
            let to = final_index(pair[1]);
            if implicit[from] {
                debug_assert_eq!(next[from], to);
                continue;
            }
            let base = next[from];
            if to >= base && to - base <= 63 {
                transition_bytes.push(((to - base) << 2) as u8);
            } else {
                debug_assert_eq!(base, 0);
                let router = to / 64 - 1;
                debug_assert!(router < routers);
                transition_bytes.push(((router) << 2) as u8);
                let base2 = 64 * (router + 1);
                transition_bytes.push(((to - base2) << 2) as u8);
            }
        }

        // --- буферы в порядке интернирования, длины непрото — последними ---
        let mut buffer_of_sym: Vec<u32> = vec![INVALID_INDEX; self.symbol_keys.len()];
        let mut buffers: Vec<Vec<u8>> = Vec::new();
        for (sym, key) in self.symbol_keys.iter().enumerate() {
            if key.has_buffer() {
                buffer_of_sym[sym] = buffers.len() as u32;
                buffers.push(std::mem::take(&mut sym_values[sym]));
            }
        }
        if nonproto.is_some() {
            buffers.push(nonproto_lengths);
        }

        // --- бакеты: жадная упаковка до целевого размера ---
        let mut bucket_streams: Vec<Vec<u8>> = Vec::new();
        let mut current = Compressor::new(self.compression.clone());
        let mut current_raw = 0usize;
        let mut current_has = false;
        for buffer in &buffers {
            current.write(buffer);
            current_raw += buffer.len();
            current_has = true;
            if current_raw >= self.bucket_size {
                bucket_streams.push(current.finish()?);
                current_raw = 0;
                current_has = false;
            }
        }
        if current_has {
            bucket_streams.push(current.finish()?);
        }

        // --- заголовок ---
        let mut header = Compressor::new(self.compression.clone());
        {
            let mut raw = Vec::new();
            write_varint32(&mut raw, bucket_streams.len() as u32);
            write_varint32(&mut raw, buffers.len() as u32);
            for stream in &bucket_streams {
                write_varint64(&mut raw, stream.len() as u64);
            }
            for buffer in &buffers {
                write_varint64(&mut raw, buffer.len() as u64);
            }
            write_varint32(&mut raw, total_nodes as u32);
            for _ in 0..routers {
                write_varint32(&mut raw, MSG_ID_NO_OP);
            }
            if self.symbol_keys.is_empty() {
                // пустой чанк: единственный NoOp-узел
                write_varint32(&mut raw, MSG_ID_NO_OP);
            }
            for key in &self.symbol_keys {
                write_varint32(&mut raw, key.serialized_tag());
            }
            for i in 0..total_nodes {
                let encoded = if implicit[i] {
                    next[i] + total_nodes
                } else {
                    next[i]
                };
                write_varint32(&mut raw, encoded as u32);
            }
            for key in &self.symbol_keys {
                if let Some(subtype) = key.subtype() {
                    raw.push(subtype);
                }
            }
            for (sym, key) in self.symbol_keys.iter().enumerate() {
                if key.has_buffer() {
                    write_varint32(&mut raw, buffer_of_sym[sym]);
                }
            }
            let first_node = seq.first().map(|&s| final_index(s)).unwrap_or(routers);
            write_varint32(&mut raw, first_node as u32);
            header.write(&raw);
        }
        let header_stream = header.finish()?;

        // --- сборка нагрузки ---
        let mut payload = Vec::new();
        payload.push(self.compression.compression.as_byte());
        write_varint64(&mut payload, header_stream.len() as u64);
        payload.extend_from_slice(&header_stream);
        for stream in &bucket_streams {
            payload.extend_from_slice(stream);
        }
        let mut transitions = Compressor::new(self.compression.clone());
        transitions.write(&transition_bytes);
        payload.extend_from_slice(&transitions.finish()?);

        let chunk = Chunk::new(
            ChunkType::Transposed,
            payload,
            self.num_records,
            self.decoded_data_size,
        )?;
        self.clear();
        Ok(chunk)
    }

    fn clear(&mut self) {
        self.paths.clear();
        self.next_path_id = 1;
        self.symbols.clear();
        self.symbol_keys.clear();
        self.records.clear();
        self.num_records = 0;
        self.decoded_data_size = 0;
    }
}
