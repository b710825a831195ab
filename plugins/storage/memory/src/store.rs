use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;

use tokio::sync::{Mutex, RwLock};

use summary_api::{EntityId, EntityStore, RawSeries, SevenNumberSummary, StoreError, SummaryKey, SummaryStore};

// ═══════════════════════════════════════════════════════════════
//  MemoryEntityStore
// ═══════════════════════════════════════════════════════════════

/// Raw-серии по id документа.
#[derive(Default)]
pub struct MemoryEntityStore {
    series: RwLock<HashMap<EntityId, RawSeries>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, id: EntityId, raw: RawSeries) {
        self.series.write().await.insert(id, raw);
    }

    pub async fn remove(&self, id: &EntityId) -> Option<RawSeries> {
        self.series.write().await.remove(id)
    }
}

impl EntityStore for MemoryEntityStore {
    fn load(&self, id: &EntityId) -> Pin<Box<dyn Future<Output = Result<Option<RawSeries>, StoreError>> + Send + '_>> {
        let id = id.clone();
        Box::pin(async move { Ok(self.series.read().await.get(&id).cloned()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemorySummaryStore
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct SummaryState {
    current: BTreeMap<SummaryKey, SevenNumberSummary>,
    /// Все успешные upsert'ы в порядке выполнения.
    journal: Vec<SevenNumberSummary>,
    fail_next: Option<StoreError>,
}

/// Сводки по (key, at) + журнал записей. Upsert выполняется под одним
/// lock'ом, читатели никогда не видят промежуточного состояния.
#[derive(Default)]
pub struct MemorySummaryStore {
    state: Mutex<SummaryState>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &SummaryKey) -> Option<SevenNumberSummary> {
        self.state.lock().await.current.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.current.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Журнал всех успешных upsert'ов в порядке выполнения.
    pub async fn writes(&self) -> Vec<SevenNumberSummary> {
        self.state.lock().await.journal.clone()
    }

    /// Следующий upsert завершится этой ошибкой, не изменив состояние.
    pub async fn fail_next_upsert(&self, error: StoreError) {
        self.state.lock().await.fail_next = Some(error);
    }
}

impl SummaryStore for MemorySummaryStore {
    fn upsert(&self, summary: &SevenNumberSummary) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let summary = summary.clone();
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if let Some(e) = state.fail_next.take() {
                return Err(e);
            }
            state.current.insert(summary.summary_key(), summary.clone());
            state.journal.push(summary);
            Ok(())
        })
    }
}
