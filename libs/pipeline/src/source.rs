use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use summary_api::{ChangeFilter, ChangeRecord, ChangeSource, ChangeStream, OpKind, Position, StartAt, StoreError};

use crate::stats::PipelineStats;
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Subscription — resume position → filtered change stream
// ═══════════════════════════════════════════════════════════════

/// Операции, которые меняют raw-серии.
pub const TRACKED_OPS: [OpKind; 2] = [OpKind::Insert, OpKind::Update];

/// Фильтр подписки: позиция > `after`, нужный namespace, insert/update.
pub fn change_filter(after: Position, namespace: &str) -> ChangeFilter {
    ChangeFilter {
        start: StartAt::After(after),
        namespace: Some(namespace.to_string()),
        ops: TRACKED_OPS.to_vec(),
    }
}

/// Подписаться на insert/update записи namespace'а строго после `after`.
pub async fn subscribe(
    source: &dyn ChangeSource,
    after: Position,
    namespace: &str,
) -> Result<Box<dyn ChangeStream>, PipelineError> {
    source
        .subscribe(&change_filter(after, namespace))
        .await
        .map_err(PipelineError::StreamBroken)
}

/// Запустить стадию подписки: stream.next() → handoff канал.
///
/// Ждёт записи без ограничения по времени. Ошибка источника или конец
/// потока завершают стадию с `StreamBroken`. Если downstream закрыт,
/// стадия тихо завершается, ошибку вернёт тот, кто его закрыл.
pub(crate) fn spawn_subscription(
    mut stream: Box<dyn ChangeStream>,
    tx: mpsc::Sender<ChangeRecord>,
    stats: Arc<PipelineStats>,
) -> JoinHandle<Result<(), PipelineError>> {
    tokio::spawn(async move {
        loop {
            match stream.next().await {
                Ok(Some(record)) => {
                    stats.record_seen();
                    tracing::trace!(
                        position = %record.position,
                        op = %record.op,
                        ns = %record.namespace,
                        "change record"
                    );
                    if tx.send(record).await.is_err() {
                        tracing::debug!("subscription: downstream closed");
                        return Ok(());
                    }
                }
                Ok(None) => {
                    tracing::error!("subscription: change stream ended");
                    return Err(PipelineError::StreamBroken(StoreError::transport("change stream ended")));
                }
                Err(e) => {
                    tracing::error!(kind = %e.kind(), error = %e, "subscription: change stream broken");
                    return Err(PipelineError::StreamBroken(e));
                }
            }
        }
    })
}
