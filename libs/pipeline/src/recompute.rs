use std::sync::Arc;

use summary_api::{EntityId, EntityStore, SummaryKey, SummaryStore, summarize};

use crate::config::MissingEntityPolicy;
use crate::stats::PipelineStats;
use crate::PipelineError;

/// Результат одного пересчёта.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecomputeOutcome {
    /// Сводка записана (upsert) под этим ключом.
    Persisted(SummaryKey),
    /// В серии нет наблюдений: квантили не определены, запись не делается.
    EmptySeries(SummaryKey),
    /// Документ исчез, политика `skip`.
    SkippedMissing(EntityId),
}

/// Пересчёт seven-number summary по id raw-документа.
///
/// Без внутренних retry: ошибка загрузки или записи возвращается
/// вызывающему как есть.
pub struct Recomputer {
    entities: Arc<dyn EntityStore>,
    summaries: Arc<dyn SummaryStore>,
    on_missing: MissingEntityPolicy,
    stats: Arc<PipelineStats>,
}

impl Recomputer {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        summaries: Arc<dyn SummaryStore>,
        on_missing: MissingEntityPolicy,
    ) -> Self {
        Self::with_stats(entities, summaries, on_missing, Arc::new(PipelineStats::default()))
    }

    pub(crate) fn with_stats(
        entities: Arc<dyn EntityStore>,
        summaries: Arc<dyn SummaryStore>,
        on_missing: MissingEntityPolicy,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { entities, summaries, on_missing, stats }
    }

    /// load raw → sort → quantiles → upsert по (key, at).
    pub async fn recompute(&self, id: &EntityId) -> Result<RecomputeOutcome, PipelineError> {
        let raw = match self.entities.load(id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => match self.on_missing {
                MissingEntityPolicy::Fail => return Err(PipelineError::NotFound(id.clone())),
                MissingEntityPolicy::Skip => {
                    self.stats.entity_skipped();
                    tracing::warn!(%id, "recompute: entity not found, skipping");
                    return Ok(RecomputeOutcome::SkippedMissing(id.clone()));
                }
            },
            Err(e) => return Err(PipelineError::LoadFailed { id: id.clone(), source: e }),
        };

        let Some(summary) = summarize(&raw) else {
            self.stats.series_empty();
            let key = SummaryKey { key: raw.key, at: raw.at };
            tracing::warn!(%id, %key, "recompute: series has no values, summary not written");
            return Ok(RecomputeOutcome::EmptySeries(key));
        };

        let key = summary.summary_key();
        self.summaries
            .upsert(&summary)
            .await
            .map_err(|e| PipelineError::PersistFailed { key: key.clone(), source: e })?;
        self.stats.summary_persisted();

        tracing::debug!(
            %id,
            %key,
            samples = raw.values.len(),
            min = summary.min,
            p50 = summary.p50,
            max = summary.max,
            "summary upserted"
        );
        Ok(RecomputeOutcome::Persisted(key))
    }
}

#[cfg(test)]
mod tests {
    use storage_memory::{MemoryEntityStore, MemorySummaryStore};
    use summary_api::{Datapoint, RawSeries, StoreError};

    use super::*;

    fn raw(key: &str, values: &[f64]) -> RawSeries {
        RawSeries {
            key: key.into(),
            at: 1_700_000_040,
            values: values
                .iter()
                .enumerate()
                .map(|(i, &value)| Datapoint { at_ms: 1_700_000_040_000 + i as i64, value })
                .collect(),
        }
    }

    fn setup(policy: MissingEntityPolicy) -> (Arc<MemoryEntityStore>, Arc<MemorySummaryStore>, Recomputer) {
        let entities = Arc::new(MemoryEntityStore::new());
        let summaries = Arc::new(MemorySummaryStore::new());
        let recomputer = Recomputer::new(entities.clone(), summaries.clone(), policy);
        (entities, summaries, recomputer)
    }

    #[tokio::test]
    async fn persists_summary_under_series_key() {
        let (entities, summaries, recomputer) = setup(MissingEntityPolicy::Fail);
        let id = EntityId::Key("abc".into());
        let values: Vec<f64> = (1..=10).rev().map(f64::from).collect();
        entities.put(id.clone(), raw("cpu", &values)).await;

        let outcome = recomputer.recompute(&id).await.unwrap();
        let key = SummaryKey { key: "cpu".into(), at: 1_700_000_040 };
        assert_eq!(outcome, RecomputeOutcome::Persisted(key.clone()));

        let summary = summaries.get(&key).await.unwrap();
        assert_eq!((summary.min, summary.p50, summary.max), (1.0, 5.5, 10.0));
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let (entities, summaries, recomputer) = setup(MissingEntityPolicy::Fail);
        let id = EntityId::ObjectId("65a1f0c2e4b0a1b2c3d4e5f6".into());
        entities.put(id.clone(), raw("mem", &[0.1, 0.9, 0.4, 0.4, 0.7])).await;

        for _ in 0..3 {
            recomputer.recompute(&id).await.unwrap();
        }
        let writes = summaries.writes().await;
        assert_eq!(writes.len(), 3);
        assert!(writes.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(summaries.len().await, 1);
    }

    #[tokio::test]
    async fn revisions_collapse_to_one_summary() {
        let (entities, summaries, recomputer) = setup(MissingEntityPolicy::Fail);
        let a = EntityId::Key("rev-a".into());
        let b = EntityId::Key("rev-b".into());
        entities.put(a.clone(), raw("disk", &[1.0, 2.0])).await;
        entities.put(b.clone(), raw("disk", &[5.0, 6.0])).await;

        recomputer.recompute(&a).await.unwrap();
        recomputer.recompute(&b).await.unwrap();

        assert_eq!(summaries.len().await, 1);
        let key = SummaryKey { key: "disk".into(), at: 1_700_000_040 };
        assert_eq!(summaries.get(&key).await.unwrap().min, 5.0);
    }

    #[tokio::test]
    async fn missing_entity_fails_by_default() {
        let (_, summaries, recomputer) = setup(MissingEntityPolicy::Fail);
        let err = recomputer.recompute(&EntityId::Key("gone".into())).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(ref id) if id.as_str() == "gone"));
        assert_eq!(err.stage(), "recompute");
        assert!(summaries.is_empty().await);
    }

    #[tokio::test]
    async fn missing_entity_skipped_when_configured() {
        let (_, _, recomputer) = setup(MissingEntityPolicy::Skip);
        let id = EntityId::Key("gone".into());
        let outcome = recomputer.recompute(&id).await.unwrap();
        assert_eq!(outcome, RecomputeOutcome::SkippedMissing(id));
    }

    #[tokio::test]
    async fn empty_series_writes_nothing() {
        let (entities, summaries, recomputer) = setup(MissingEntityPolicy::Fail);
        let id = EntityId::Key("fresh".into());
        entities.put(id.clone(), raw("net", &[])).await;

        let outcome = recomputer.recompute(&id).await.unwrap();
        assert!(matches!(outcome, RecomputeOutcome::EmptySeries(_)));
        assert!(summaries.is_empty().await);
    }

    #[tokio::test]
    async fn persist_failure_leaves_previous_summary() {
        let (entities, summaries, recomputer) = setup(MissingEntityPolicy::Fail);
        let id = EntityId::Key("abc".into());
        entities.put(id.clone(), raw("cpu", &[1.0, 2.0, 3.0])).await;
        recomputer.recompute(&id).await.unwrap();

        entities.put(id.clone(), raw("cpu", &[100.0])).await;
        summaries.fail_next_upsert(StoreError::transport("write concern timeout")).await;
        let err = recomputer.recompute(&id).await.unwrap_err();
        assert!(matches!(err, PipelineError::PersistFailed { .. }));

        let key = SummaryKey { key: "cpu".into(), at: 1_700_000_040 };
        assert_eq!(summaries.get(&key).await.unwrap().max, 3.0);
    }
}
