//! transpose — колоночное кодирование протобуф-записей.
//!
//! Чанк раскладывается на поток тегов (машина состояний), колонки значений
//! (буферы, упакованные в сжатые бакеты) и поток переходов. Декодер
//! воспроизводит записи в обратном порядке в backward-писатель, поэтому
//! длины вложенных сообщений дописываются без второго прохода.
//!
//! Нагрузка транспонированного чанка:
//! [байт сжатия]
//! [varint длины заголовка][сжатый заголовок]
//! [бакеты подряд]
//! [сжатый поток переходов]
//!
//! Заголовок (после распаковки):
//! [num_buckets][num_buffers][длины бакетов][длины буферов]
//! [state_machine_size][теги][индексы next (>= size — неявный переход)]
//! [байты подтипов для varint-тегов][индексы буферов по месту][first_node]

pub mod decode;
pub mod encode;

pub use encode::TransposeEncoder;

// ---------- wire format ----------

pub(crate) const WIRE_VARINT: u32 = 0;
pub(crate) const WIRE_FIXED64: u32 = 1;
pub(crate) const WIRE_LENGTH_DELIMITED: u32 = 2;
pub(crate) const WIRE_START_GROUP: u32 = 3;
pub(crate) const WIRE_END_GROUP: u32 = 4;
pub(crate) const WIRE_FIXED32: u32 = 5;

/// Служебный wire type: конец вложенного сообщения (только внутри заголовка).
pub(crate) const WIRE_SUBMESSAGE: u32 = 6;

#[inline]
pub(crate) fn tag_wire_type(tag: u32) -> u32 {
    tag & 7
}

#[inline]
pub(crate) fn tag_field_number(tag: u32) -> u32 {
    tag >> 3
}

#[inline]
pub(crate) fn make_tag(field_number: u32, wire_type: u32) -> u32 {
    (field_number << 3) | wire_type
}

/// Валидный протобуф-тег: известный wire type и номер поля >= 1.
pub(crate) fn valid_tag(tag: u32) -> bool {
    tag >= 8 && tag_wire_type(tag) <= WIRE_FIXED32
}

// ---------- message ids ----------
//
// Специальные значения в потоке тегов заголовка.
pub(crate) const MSG_ID_NO_OP: u32 = 0;
pub(crate) const MSG_ID_NON_PROTO: u32 = 1;
pub(crate) const MSG_ID_START_OF_MESSAGE: u32 = 2;
pub(crate) const MSG_ID_START_OF_SUBMESSAGE: u32 = 3;

// ---------- subtypes ----------
//
// Уточнение varint-тега: класс длины значения либо «вшитое» однобайтовое
// значение (subtype = SUBTYPE_VARINT_INLINE_0 + байт значения).
pub(crate) const SUBTYPE_TRIVIAL: u8 = 0;
pub(crate) const SUBTYPE_LENGTH_DELIMITED_STRING: u8 = SUBTYPE_TRIVIAL;
pub(crate) const SUBTYPE_LENGTH_DELIMITED_END_OF_SUBMESSAGE: u8 = 1;
pub(crate) const SUBTYPE_VARINT_1: u8 = 0;
pub(crate) const SUBTYPE_VARINT_MAX: u8 = 9; // varint длиной 10 байт
pub(crate) const SUBTYPE_VARINT_INLINE_0: u8 = 10;
pub(crate) const SUBTYPE_VARINT_INLINE_MAX: u8 = SUBTYPE_VARINT_INLINE_0 + 0x7f;

/// Несёт ли тег байт подтипа в заголовке.
#[inline]
pub(crate) fn has_subtype(tag: u32) -> bool {
    tag_wire_type(tag) == WIRE_VARINT
}

/// Читает ли узел значения из буфера данных.
pub(crate) fn has_data_buffer(tag: u32, subtype: u8) -> bool {
    match tag_wire_type(tag) {
        WIRE_VARINT => subtype < SUBTYPE_VARINT_INLINE_0,
        WIRE_FIXED32 | WIRE_FIXED64 => true,
        WIRE_LENGTH_DELIMITED => subtype == SUBTYPE_LENGTH_DELIMITED_STRING,
        _ => false,
    }
}

// ---------- state machine ----------

/// Нет буфера / нет шаблона.
pub(crate) const INVALID_INDEX: u32 = u32::MAX;

/// Сколько guard-узлов (Failure) добавляется за таблицей, чтобы переходный
/// байт не мог выйти за массив.
pub(crate) const GUARD_NODES: usize = 0xff;

/// Предвычисленный тег узла: varint тега (до 5 байт) + дополнительный байт
/// (вшитое значение или ноль).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TagData {
    pub bytes: [u8; 7],
    pub len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Callback {
    NoOp,
    MessageStart,
    SubmessageStart,
    SubmessageEnd,
    Select,
    SkippedSubmessageStart,
    SkippedSubmessageEnd,
    NonProto,
    Failure,
    CopyTag { tag_len: u8 },
    Varint { tag_len: u8, len: u8 },
    Fixed32 { tag_len: u8 },
    Fixed64 { tag_len: u8 },
    Fixed32Existence { tag_len: u8 },
    Fixed64Existence { tag_len: u8 },
    String { tag_len: u8 },
    StartProjectionGroup { tag_len: u8 },
    EndProjectionGroup { tag_len: u8 },
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Node {
    pub callback: Callback,
    pub implicit: bool,
    pub next: u32,
    /// Глобальный индекс буфера данных (INVALID_INDEX — нет).
    pub buffer: u32,
    pub tag_data: TagData,
    /// Индекс шаблона для Select (INVALID_INDEX — нет).
    pub template: u32,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            callback: Callback::Failure,
            implicit: false,
            next: 0,
            buffer: INVALID_INDEX,
            tag_data: TagData::default(),
            template: INVALID_INDEX,
        }
    }
}

/// Отложенное разрешение callback-а под проекцией.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeTemplate {
    pub tag: u32,
    pub subtype: u8,
    pub tag_len: u8,
    /// Глобальный индекс буфера (INVALID_INDEX — значения не нужны).
    pub buffer: u32,
}

/// Включённость поля при разрешении Select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldIncluded {
    Yes,
    No,
    ExistenceOnly,
}

/// Callback для узла по включённости, тегу и подтипу.
/// None — невозможная комбинация (повреждённый заголовок).
pub(crate) fn callback_for(
    included: FieldIncluded,
    tag: u32,
    subtype: u8,
    tag_len: u8,
    projection_enabled: bool,
) -> Option<Callback> {
    match included {
        FieldIncluded::Yes => match tag_wire_type(tag) {
            WIRE_VARINT => {
                if subtype >= SUBTYPE_VARINT_INLINE_0 {
                    if subtype > SUBTYPE_VARINT_INLINE_MAX {
                        return None;
                    }
                    Some(Callback::CopyTag {
                        tag_len: tag_len + 1,
                    })
                } else if subtype <= SUBTYPE_VARINT_MAX {
                    Some(Callback::Varint {
                        tag_len,
                        len: subtype - SUBTYPE_VARINT_1 + 1,
                    })
                } else {
                    None
                }
            }
            WIRE_FIXED32 => Some(Callback::Fixed32 { tag_len }),
            WIRE_FIXED64 => Some(Callback::Fixed64 { tag_len }),
            WIRE_LENGTH_DELIMITED => match subtype {
                SUBTYPE_LENGTH_DELIMITED_STRING => Some(Callback::String { tag_len }),
                SUBTYPE_LENGTH_DELIMITED_END_OF_SUBMESSAGE => Some(Callback::SubmessageEnd),
                _ => None,
            },
            WIRE_START_GROUP => Some(if projection_enabled {
                Callback::StartProjectionGroup { tag_len }
            } else {
                Callback::CopyTag { tag_len }
            }),
            WIRE_END_GROUP => Some(if projection_enabled {
                Callback::EndProjectionGroup { tag_len }
            } else {
                Callback::CopyTag { tag_len }
            }),
            _ => None,
        },
        FieldIncluded::No => match tag_wire_type(tag) {
            WIRE_VARINT | WIRE_FIXED32 | WIRE_FIXED64 => Some(Callback::NoOp),
            WIRE_LENGTH_DELIMITED => match subtype {
                SUBTYPE_LENGTH_DELIMITED_STRING => Some(Callback::NoOp),
                SUBTYPE_LENGTH_DELIMITED_END_OF_SUBMESSAGE => {
                    Some(Callback::SkippedSubmessageEnd)
                }
                _ => None,
            },
            WIRE_START_GROUP => Some(Callback::SkippedSubmessageStart),
            WIRE_END_GROUP => Some(Callback::SkippedSubmessageEnd),
            _ => None,
        },
        FieldIncluded::ExistenceOnly => match tag_wire_type(tag) {
            // нулевой байт за тегом декодируется как varint 0 / пустая строка
            WIRE_VARINT => Some(Callback::CopyTag {
                tag_len: tag_len + 1,
            }),
            WIRE_FIXED32 => Some(Callback::Fixed32Existence { tag_len }),
            WIRE_FIXED64 => Some(Callback::Fixed64Existence { tag_len }),
            WIRE_LENGTH_DELIMITED => match subtype {
                SUBTYPE_LENGTH_DELIMITED_STRING => Some(Callback::CopyTag {
                    tag_len: tag_len + 1,
                }),
                SUBTYPE_LENGTH_DELIMITED_END_OF_SUBMESSAGE => Some(Callback::SubmessageEnd),
                _ => None,
            },
            WIRE_START_GROUP => Some(Callback::StartProjectionGroup { tag_len }),
            WIRE_END_GROUP => Some(Callback::EndProjectionGroup { tag_len }),
            _ => None,
        },
    }
}
