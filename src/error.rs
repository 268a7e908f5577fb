//! error — коды статусов и «липкое» состояние потоковых объектов.
//!
//! Что здесь:
//! - Status/StatusCode: клонируемая корневая ошибка с каноническим кодом.
//!   Переносится внутри anyhow::Error; контекст навешивается через .context()
//!   ("reading {path}", "at byte {pos}") без потери исходного кода.
//! - status_code(): извлечь код из anyhow-цепочки (root cause или контексты).
//! - ObjectState: жизненный цикл объекта. После первого сбоя все последующие
//!   операции возвращают тот же статус до close(); recover-пути снимают сбой
//!   через mark_not_failed().

use std::fmt;

/// Канонический код статуса операции.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    InvalidArgument,
    DataLoss,
    ResourceExhausted,
    Unimplemented,
    FailedPrecondition,
    OutOfRange,
    Unknown,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DataLoss => "DATA_LOSS",
            StatusCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusCode::Unimplemented => "UNIMPLEMENTED",
            StatusCode::FailedPrecondition => "FAILED_PRECONDITION",
            StatusCode::OutOfRange => "OUT_OF_RANGE",
            StatusCode::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Корневая ошибка с кодом. Клонируема — хранится в ObjectState как sticky-статус.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn data_loss(message: impl Into<String>) -> Self {
        Self::new(StatusCode::DataLoss, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ResourceExhausted, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unimplemented, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FailedPrecondition, message)
    }

    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::new(StatusCode::OutOfRange, message)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}

/// Извлечь канонический код из anyhow-цепочки.
/// Контексты просматриваются от внешнего к корню; первый Status побеждает.
pub fn status_code(err: &anyhow::Error) -> StatusCode {
    for cause in err.chain() {
        if let Some(st) = cause.downcast_ref::<Status>() {
            return st.code;
        }
    }
    StatusCode::Unknown
}

/// Состояние потокового объекта: открыт / закрыт / сбой.
///
/// Сбой «липкий»: статус сохраняется и возвращается из каждой последующей
/// операции. close() идемпотентен.
#[derive(Debug, Clone)]
pub struct ObjectState {
    closed: bool,
    status: Option<Status>,
}

impl ObjectState {
    /// Изначально открытый объект.
    pub fn open() -> Self {
        Self {
            closed: false,
            status: None,
        }
    }

    /// Изначально закрытый объект.
    pub fn new_closed() -> Self {
        Self {
            closed: true,
            status: None,
        }
    }

    #[inline]
    pub fn healthy(&self) -> bool {
        !self.closed && self.status.is_none()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        !self.closed
    }

    pub fn status(&self) -> Option<Status> {
        self.status.clone()
    }

    /// Err со старым статусом, если объект закрыт или уже в сбое.
    pub fn ensure_healthy(&self) -> anyhow::Result<()> {
        if let Some(st) = &self.status {
            return Err(st.clone().into());
        }
        if self.closed {
            return Err(Status::failed_precondition("object is closed").into());
        }
        Ok(())
    }

    /// Зафиксировать сбой (первый побеждает) и вернуть ошибку вызывающему.
    pub fn fail(&mut self, err: anyhow::Error) -> anyhow::Error {
        if self.status.is_none() {
            let code = status_code(&err);
            let mut message = format!("{:#}", err);
            // код уже в начале сообщения — не дублируем его в Display
            let prefix = format!("{}: ", code);
            if let Some(stripped) = message.strip_prefix(&prefix) {
                message = stripped.to_string();
            }
            self.status = Some(Status::new(code, message));
        }
        err
    }

    /// Снять сбой (recovery-пути).
    pub fn mark_not_failed(&mut self) {
        self.status = None;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

impl Default for ObjectState {
    fn default() -> Self {
        Self::open()
    }
}
