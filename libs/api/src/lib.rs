mod error;
mod stats;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use error::{ErrorKind, StoreError};
pub use stats::{SUMMARY_PERCENTILES, quantile, summarize};
pub use types::{
    ChangeFilter, ChangeRecord, Datapoint, EntityId, OpKind, Position, RawSeries,
    SevenNumberSummary, StartAt, SummaryKey,
};

// ════════════════════════════════════════════════════════════════
//  Change Log Source
// ════════════════════════════════════════════════════════════════

/// Подписка на лог: бесконечный поток записей в порядке позиций.
///
/// `next()` приостанавливает вызывающую задачу, пока новой записи нет
/// (реальное ожидание, не polling).
///
/// - `Ok(Some(record))` — следующая запись
/// - `Ok(None)` — поток закончился (tailing cursor умер)
/// - `Err(e)` — поток сломан (обрыв соединения, cursor invalidated)
pub trait ChangeStream: Send {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>>;
}

/// Replicated log с возможностью возобновления с позиции.
///
/// Backends: MongoDB oplog (`storage-mongo`), in-memory лог (`storage-memory`).
pub trait ChangeSource: Send + Sync {
    /// Самая свежая запись лога. `None`, если лог пуст.
    fn latest(&self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>>;

    /// Подписаться на записи, удовлетворяющие фильтру.
    fn subscribe(
        &self,
        filter: &ChangeFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChangeStream>, StoreError>> + Send + '_>>;
}

// ════════════════════════════════════════════════════════════════
//  Stores
// ════════════════════════════════════════════════════════════════

/// Чтение raw-серий по id документа.
pub trait EntityStore: Send + Sync {
    /// `Ok(None)`: документа нет, отличается от транспортной ошибки.
    fn load(&self, id: &EntityId) -> Pin<Box<dyn Future<Output = Result<Option<RawSeries>, StoreError>> + Send + '_>>;
}

/// Хранилище сводок с атомарным upsert по (key, at).
pub trait SummaryStore: Send + Sync {
    /// Заменить сводку целиком или вставить новую. Last-write-wins,
    /// без частичных записей.
    fn upsert(&self, summary: &SevenNumberSummary) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}
