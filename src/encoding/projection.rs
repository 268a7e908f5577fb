//! projection — дерево включённых полей.
//!
//! Путь — последовательность номеров полей от корня записи, опционально
//! завершённая маркером EXISTENCE_ONLY (важен факт присутствия, не данные).
//! Пустое множество путей и путь нулевой длины означают «включить всё».

use anyhow::Result;
use std::collections::HashMap;

use crate::error::Status;

/// Маркер «только существование» в конце пути.
pub const EXISTENCE_ONLY: u32 = u32::MAX;

/// Корневой идентификатор в дереве включений.
pub(crate) const ROOT_ID: u32 = u32::MAX;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    path: Vec<u32>,
}

impl Field {
    pub fn new(path: Vec<u32>) -> Self {
        Self { path }
    }

    /// Путь, от которого нужен только факт присутствия.
    pub fn existence_only(mut path: Vec<u32>) -> Self {
        path.push(EXISTENCE_ONLY);
        Self { path }
    }

    pub fn path(&self) -> &[u32] {
        &self.path
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldProjection {
    fields: Vec<Field>,
}

/// Как поле включено в проекцию.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum IncludeType {
    // порядок важен: min() при слиянии путей расширяет включение
    Fully,
    ChildOnly,
    ExistenceOnly,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IncludedField {
    pub field_id: u32,
    pub include_type: IncludeType,
}

impl FieldProjection {
    /// Включить всё.
    pub fn all() -> Self {
        Self {
            fields: vec![Field::new(vec![])],
        }
    }

    /// Пустой набор путей (тоже «включить всё»).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn includes_all(&self) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f.path.is_empty())
    }

    /// Построить дерево включений: (parent_id, field_number) -> IncludedField.
    /// Идентификаторы присваиваются последовательно, корень — ROOT_ID.
    pub(crate) fn build_tree(&self) -> Result<HashMap<(u32, u32), IncludedField>> {
        let mut tree: HashMap<(u32, u32), IncludedField> = HashMap::new();
        let mut next_id: u32 = 0;
        for field in &self.fields {
            let mut path_len = field.path.len();
            let existence_only = path_len > 0 && field.path[path_len - 1] == EXISTENCE_ONLY;
            if existence_only {
                path_len -= 1;
                if path_len == 0 {
                    continue;
                }
            }
            let mut current_id = ROOT_ID;
            for (i, &field_number) in field.path[..path_len].iter().enumerate() {
                if field_number == EXISTENCE_ONLY {
                    return Err(Status::invalid_argument(
                        "existence-only marker in the middle of a field path",
                    )
                    .into());
                }
                let include_type = if i + 1 == path_len {
                    if existence_only {
                        IncludeType::ExistenceOnly
                    } else {
                        IncludeType::Fully
                    }
                } else {
                    IncludeType::ChildOnly
                };
                let entry = tree.entry((current_id, field_number)).or_insert_with(|| {
                    let id = next_id;
                    next_id += 1;
                    IncludedField {
                        field_id: id,
                        include_type,
                    }
                });
                entry.include_type = entry.include_type.min(include_type);
                current_id = entry.field_id;
            }
        }
        Ok(tree)
    }
}
