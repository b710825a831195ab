use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики пайплайна. Пишет каждая стадия в своей задаче, читать
/// можно из любой.
#[derive(Debug, Default)]
pub struct PipelineStats {
    records: AtomicU64,
    extracted: AtomicU64,
    dropped: AtomicU64,
    recomputed: AtomicU64,
    empty: AtomicU64,
    skipped: AtomicU64,
}

impl PipelineStats {
    pub(crate) fn record_seen(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn id_extracted(&self) {
        self.extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn summary_persisted(&self) {
        self.recomputed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn series_empty(&self) {
        self.empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn entity_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            records: self.records.load(Ordering::Relaxed),
            extracted: self.extracted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            recomputed: self.recomputed.load(Ordering::Relaxed),
            empty: self.empty.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Записи, прошедшие фильтр подписки.
    pub records: u64,
    /// Извлечённые id.
    pub extracted: u64,
    /// Записи без пригодного `_id`.
    pub dropped: u64,
    /// Сохранённые сводки.
    pub recomputed: u64,
    /// Пустые серии (сводка не пишется).
    pub empty: u64,
    /// Пропущенные исчезнувшие документы (`on_missing = skip`).
    pub skipped: u64,
}
