use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════
//  Position
// ════════════════════════════════════════════════════════════════

/// Позиция записи в replicated log: секунды лога + порядковый номер
/// внутри секунды. Сравнение лексикографическое (time, increment).
///
/// Единственный валидный resume token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub time: u32,
    pub increment: u32,
}

impl Position {
    pub const fn new(time: u32, increment: u32) -> Self {
        Self { time, increment }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.time, self.increment)
    }
}

// ════════════════════════════════════════════════════════════════
//  OpKind
// ════════════════════════════════════════════════════════════════

/// Тип операции в записи лога (поле `op`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpKind {
    Insert,
    Update,
    Delete,
    Command,
    Noop,
    Other(String),
}

impl OpKind {
    /// Разобрать однобуквенный код оплога (`"i"`, `"u"`, ...).
    pub fn from_code(code: &str) -> Self {
        match code {
            "i" => OpKind::Insert,
            "u" => OpKind::Update,
            "d" => OpKind::Delete,
            "c" => OpKind::Command,
            "n" => OpKind::Noop,
            other => OpKind::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            OpKind::Insert => "i",
            OpKind::Update => "u",
            OpKind::Delete => "d",
            OpKind::Command => "c",
            OpKind::Noop => "n",
            OpKind::Other(code) => code,
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for OpKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for OpKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(OpKind::from_code(&code))
    }
}

// ════════════════════════════════════════════════════════════════
//  ChangeRecord
// ════════════════════════════════════════════════════════════════

/// Одна запись replicated log'а.
///
/// Payload'ы (`object`, `selector`) хранятся как JSON: backend
/// конвертирует свой нативный формат (BSON) в relaxed extended JSON,
/// поэтому ObjectId выглядит как `{"$oid": "..."}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "ts")]
    pub position: Position,
    /// Logical clock / history id (`h`).
    #[serde(rename = "h", default)]
    pub history_id: i64,
    /// Версия формата записи (`v`).
    #[serde(rename = "v", default)]
    pub version: i32,
    pub op: OpKind,
    #[serde(rename = "ns")]
    pub namespace: String,
    /// Объект операции (`o`): документ для insert, delta для update.
    #[serde(rename = "o", default)]
    pub object: serde_json::Value,
    /// Query/selector для update (`o2`).
    #[serde(rename = "o2", default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<serde_json::Value>,
}

// ════════════════════════════════════════════════════════════════
//  ChangeFilter
// ════════════════════════════════════════════════════════════════

/// Откуда начинать подписку.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAt {
    /// Строго после позиции: запись на позиции уже обработана.
    After(Position),
    /// Включая позицию (используется `tail` для печати последней записи).
    AtOrAfter(Position),
}

impl StartAt {
    pub fn admits(&self, position: Position) -> bool {
        match *self {
            StartAt::After(p) => position > p,
            StartAt::AtOrAfter(p) => position >= p,
        }
    }
}

/// Предикат подписки на лог: позиция + namespace + типы операций.
///
/// `namespace = None` / пустой `ops`: без фильтра по соответствующему полю.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub start: StartAt,
    pub namespace: Option<String>,
    pub ops: Vec<OpKind>,
}

impl ChangeFilter {
    /// Фильтр без ограничений на namespace и операции.
    pub fn all(start: StartAt) -> Self {
        Self { start, namespace: None, ops: Vec::new() }
    }

    pub fn matches(&self, record: &ChangeRecord) -> bool {
        if !self.start.admits(record.position) {
            return false;
        }
        if let Some(ref ns) = self.namespace {
            if record.namespace != *ns {
                return false;
            }
        }
        self.ops.is_empty() || self.ops.contains(&record.op)
    }
}

// ════════════════════════════════════════════════════════════════
//  EntityId
// ════════════════════════════════════════════════════════════════

/// Идентификатор документа raw-серии, извлечённый из записи лога.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    /// 12-байтовый ObjectId в hex (24 символа, нижний регистр).
    ObjectId(String),
    /// Строковый `_id`.
    Key(String),
}

impl EntityId {
    pub fn as_str(&self) -> &str {
        match self {
            EntityId::ObjectId(hex) => hex,
            EntityId::Key(key) => key,
        }
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════
//  RawSeries / Summary
// ════════════════════════════════════════════════════════════════

/// Одно наблюдение внутри бакета.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Время наблюдения, Unix ms.
    pub at_ms: i64,
    pub value: f64,
}

/// Бакет наблюдений одной метрики. Пишется внешними producer'ами,
/// для пайплайна только чтение.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    pub key: String,
    /// Начало бакета.
    pub at: i64,
    #[serde(default)]
    pub values: Vec<Datapoint>,
}

/// Seven-number summary бакета: min, max и перцентили
/// 2/9/25/50/75/91/98.
///
/// Ключ хранения: (`key`, `at`), не id исходного документа:
/// несколько ревизий raw-серии схлопываются в одну сводку.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SevenNumberSummary {
    pub key: String,
    pub at: i64,
    pub min: f64,
    pub max: f64,
    pub p2: f64,
    pub p9: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p91: f64,
    pub p98: f64,
}

impl SevenNumberSummary {
    pub fn summary_key(&self) -> SummaryKey {
        SummaryKey { key: self.key.clone(), at: self.at }
    }
}

/// Composite key сводки.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SummaryKey {
    pub key: String,
    pub at: i64,
}

impl std::fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.key, self.at)
    }
}
