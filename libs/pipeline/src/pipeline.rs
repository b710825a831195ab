use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use summary_api::{ChangeSource, EntityId, EntityStore, SummaryStore};

use crate::config::PipelineConfig;
use crate::extract::spawn_extractor;
use crate::recompute::Recomputer;
use crate::resume::resolve_resume_position;
use crate::source::{spawn_subscription, subscribe};
use crate::stats::{PipelineStats, StatsSnapshot};
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Pipeline — resume → subscribe → extract → recompute
// ═══════════════════════════════════════════════════════════════

/// Tailing pipeline: одна задача на стадию, стадии соединены bounded
/// mpsc каналами (back-pressure до источника).
///
/// Пересчёт выполняется последовательно в задаче, вызвавшей `run`, в
/// порядке записей лога, пересчёты одного документа не переупорядочиваются.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn ChangeSource>,
    recomputer: Recomputer,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ChangeSource>,
        entities: Arc<dyn EntityStore>,
        summaries: Arc<dyn SummaryStore>,
    ) -> Self {
        let stats = Arc::new(PipelineStats::default());
        let recomputer = Recomputer::with_stats(entities, summaries, config.on_missing, stats.clone());
        Self { config, source, recomputer, stats }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Запустить пайплайн. Возвращается только по первой ошибке любой
    /// стадии или по отмене `token` (тогда `Ok(())`).
    pub async fn run(&self, token: CancellationToken) -> Result<(), PipelineError> {
        let resume = resolve_resume_position(&*self.source).await?;
        tracing::info!(%resume, namespace = %self.config.namespace, "resuming after position");

        let stream = subscribe(&*self.source, resume, &self.config.namespace).await?;

        let buffer = self.config.handoff_buffer.max(1);
        let (record_tx, record_rx) = mpsc::channel(buffer);
        let (id_tx, mut id_rx) = mpsc::channel(buffer);

        let subscription = spawn_subscription(stream, record_tx, self.stats.clone());
        let extractor = spawn_extractor(record_rx, id_tx, self.stats.clone());

        match self.consume(&mut id_rx, &token).await {
            Err(e) => {
                match e.store_kind() {
                    Some(kind) => tracing::error!(stage = e.stage(), %kind, error = %e, "pipeline halted"),
                    None => tracing::error!(stage = e.stage(), error = %e, "pipeline halted"),
                }
                subscription.abort();
                extractor.abort();
                Err(e)
            }
            Ok(Consumed::Cancelled) => {
                tracing::info!("pipeline cancelled");
                subscription.abort();
                extractor.abort();
                Ok(())
            }
            Ok(Consumed::Drained) => {
                // Upstream закрыл канал: причину вернёт первая упавшая стадия.
                join_stage(subscription, "subscribe").await?;
                join_stage(extractor, "extract").await?;
                Ok(())
            }
        }
    }

    async fn consume(
        &self,
        ids: &mut mpsc::Receiver<EntityId>,
        token: &CancellationToken,
    ) -> Result<Consumed, PipelineError> {
        loop {
            tokio::select! {
                id = ids.recv() => match id {
                    Some(id) => {
                        tracing::debug!(%id, "recompute");
                        self.recomputer.recompute(&id).await?;
                    }
                    None => return Ok(Consumed::Drained),
                },
                _ = token.cancelled() => return Ok(Consumed::Cancelled),
            }
        }
    }
}

enum Consumed {
    Drained,
    Cancelled,
}

async fn join_stage(
    handle: JoinHandle<Result<(), PipelineError>>,
    stage: &'static str,
) -> Result<(), PipelineError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::StageFailed { stage, detail: e.to_string() }),
    }
}
