use std::fmt;

/// Откуда пришла ошибка backend'а.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Строка подключения, namespace, опции драйвера. Повтор не поможет.
    Connect,
    /// Сеть, убитый cursor, недоступный primary.
    Transport,
    /// Документ не разбирается в ожидаемую форму.
    Decode,
    /// Backend отказал в записи (например, позиция позади головы лога).
    Rejected,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connect => "connect",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ошибка collaborator-трейтов (`ChangeSource`, `ChangeStream`,
/// `EntityStore`, `SummaryStore`). Пайплайн пишет `kind` в диагностику
/// остановки.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreError {
    kind: ErrorKind,
    message: String,
}

impl StoreError {
    fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Connect, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Transport, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Decode, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Rejected, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}
