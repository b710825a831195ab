use std::future::Future;
use std::pin::Pin;

use tokio::sync::watch;

use summary_api::{ChangeFilter, ChangeRecord, ChangeSource, ChangeStream, OpKind, Position, StoreError};

// ═══════════════════════════════════════════════════════════════
//  LogState
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct LogState {
    records: Vec<ChangeRecord>,
    /// Ошибка, которую получат все подписки после выдачи уже записанного.
    broken: Option<StoreError>,
    closed: bool,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryChangeLog
// ═══════════════════════════════════════════════════════════════

/// In-memory append-only лог. Подписчики ждут новых записей через
/// `watch` канал, без polling'а.
pub struct MemoryChangeLog {
    state: watch::Sender<LogState>,
}

impl Default for MemoryChangeLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        let (state, _) = watch::channel(LogState::default());
        Self { state }
    }

    /// Добавить запись с явной позицией. Позиции не должны убывать.
    pub fn append(&self, record: ChangeRecord) -> Result<(), StoreError> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            if let Some(last) = state.records.last() {
                if record.position < last.position {
                    result = Err(StoreError::rejected(format!(
                        "position {} is behind log head {}",
                        record.position, last.position
                    )));
                    return false;
                }
            }
            state.records.push(record);
            true
        });
        result
    }

    /// Добавить запись, назначив ей следующую позицию после головы лога.
    pub fn append_op(
        &self,
        op: OpKind,
        namespace: &str,
        object: serde_json::Value,
        selector: Option<serde_json::Value>,
    ) -> Position {
        let mut position = Position::default();
        self.state.send_modify(|state| {
            position = match state.records.last() {
                Some(last) => Position::new(last.position.time, last.position.increment + 1),
                None => Position::new(1, 1),
            };
            state.records.push(ChangeRecord {
                position,
                history_id: state.records.len() as i64 + 1,
                version: 2,
                op,
                namespace: namespace.to_string(),
                object,
                selector,
            });
        });
        position
    }

    /// Сломать все подписки: после выдачи записанного они вернут `error`.
    pub fn break_stream(&self, error: StoreError) {
        self.state.send_modify(|state| state.broken = Some(error));
    }

    /// Завершить все подписки (`Ok(None)` после выдачи записанного).
    pub fn close(&self) {
        self.state.send_modify(|state| state.closed = true);
    }

    pub fn len(&self) -> usize {
        self.state.borrow().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Позиция последней записи.
    pub fn head(&self) -> Option<Position> {
        self.state.borrow().records.last().map(|r| r.position)
    }
}

impl ChangeSource for MemoryChangeLog {
    fn latest(&self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>> {
        let result = {
            let state = self.state.borrow();
            match state.broken {
                Some(ref e) => Err(e.clone()),
                None => Ok(state.records.last().cloned()),
            }
        };
        Box::pin(async move { result })
    }

    fn subscribe(
        &self,
        filter: &ChangeFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChangeStream>, StoreError>> + Send + '_>> {
        let filter = filter.clone();
        Box::pin(async move {
            let rx = self.state.subscribe();
            Ok(Box::new(MemoryChangeStream { rx, cursor: 0, filter }) as Box<dyn ChangeStream>)
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryChangeStream
// ═══════════════════════════════════════════════════════════════

struct MemoryChangeStream {
    rx: watch::Receiver<LogState>,
    cursor: usize,
    filter: ChangeFilter,
}

impl MemoryChangeStream {
    /// Следующая подходящая запись из уже записанного, либо терминальное
    /// состояние лога. `None`: надо ждать.
    fn poll_state(&mut self) -> Option<Result<Option<ChangeRecord>, StoreError>> {
        let state = self.rx.borrow_and_update();
        while self.cursor < state.records.len() {
            let record = &state.records[self.cursor];
            self.cursor += 1;
            if self.filter.matches(record) {
                return Some(Ok(Some(record.clone())));
            }
        }
        if let Some(ref e) = state.broken {
            return Some(Err(e.clone()));
        }
        if state.closed {
            return Some(Ok(None));
        }
        None
    }
}

impl ChangeStream for MemoryChangeStream {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            loop {
                if let Some(result) = self.poll_state() {
                    return result;
                }
                // Sender dropped: лог уничтожен, считаем поток закончившимся.
                if self.rx.changed().await.is_err() {
                    return Ok(None);
                }
            }
        })
    }
}
