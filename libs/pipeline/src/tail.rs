use tokio_util::sync::CancellationToken;

use summary_api::{ChangeFilter, ChangeRecord, ChangeSource, StartAt, StoreError};

use crate::resume::resolve_resume_position;
use crate::PipelineError;

/// Следовать за логом без фильтров, начиная с последней записи
/// включительно, и отдавать каждую запись в `emit`.
///
/// Возвращает `Ok(())` только при отмене `token`.
pub async fn tail_log<F>(
    source: &dyn ChangeSource,
    token: CancellationToken,
    mut emit: F,
) -> Result<(), PipelineError>
where
    F: FnMut(&ChangeRecord),
{
    let head = resolve_resume_position(source).await?;
    tracing::info!(%head, "tailing change log");

    let mut stream = source
        .subscribe(&ChangeFilter::all(StartAt::AtOrAfter(head)))
        .await
        .map_err(PipelineError::StreamBroken)?;

    loop {
        tokio::select! {
            next = stream.next() => match next {
                Ok(Some(record)) => emit(&record),
                Ok(None) => return Err(PipelineError::StreamBroken(StoreError::transport("change stream ended"))),
                Err(e) => return Err(PipelineError::StreamBroken(e)),
            },
            _ = token.cancelled() => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;

    use serde_json::json;
    use storage_memory::MemoryChangeLog;
    use summary_api::{ChangeStream, OpKind, Position};
    use tokio::sync::{Notify, mpsc};

    use super::*;

    // Лог, который сигналит после subscribe: голова к этому моменту
    // уже зафиксирована.
    struct GatedLog {
        log: Arc<MemoryChangeLog>,
        subscribed: Arc<Notify>,
    }

    impl ChangeSource for GatedLog {
        fn latest(&self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>> {
            self.log.latest()
        }

        fn subscribe(
            &self,
            filter: &ChangeFilter,
        ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChangeStream>, StoreError>> + Send + '_>> {
            let fut = self.log.subscribe(filter);
            Box::pin(async move {
                let stream = fut.await;
                self.subscribed.notify_one();
                stream
            })
        }
    }

    #[tokio::test]
    async fn tail_includes_head_and_ignores_filters() {
        let log = Arc::new(MemoryChangeLog::new());
        log.append_op(OpKind::Insert, "metrics.raw", json!({"_id": "old"}), None);
        let head = log.append_op(OpKind::Noop, "", json!({"msg": "noop"}), None);

        let subscribed = Arc::new(Notify::new());
        let source = Arc::new(GatedLog { log: log.clone(), subscribed: subscribed.clone() });
        let (tx, mut rx) = mpsc::unbounded_channel::<Position>();
        let handle = tokio::spawn(async move {
            tail_log(&*source, CancellationToken::new(), |r| {
                let _ = tx.send(r.position);
            })
            .await
        });

        subscribed.notified().await;
        let delete = log.append_op(OpKind::Delete, "other.coll", json!({"_id": "x"}), None);
        log.close();

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, PipelineError::StreamBroken(_)));

        let mut seen = Vec::new();
        while let Some(position) = rx.recv().await {
            seen.push(position);
        }
        assert_eq!(seen, [head, delete]);
    }

    #[tokio::test]
    async fn cancellation_returns_ok() {
        let log = MemoryChangeLog::new();
        log.append_op(OpKind::Noop, "", json!({}), None);
        let token = CancellationToken::new();
        token.cancel();

        let mut seen = 0;
        tail_log(&log, token, |_| seen += 1).await.unwrap();
        assert!(seen <= 1);
    }
}
