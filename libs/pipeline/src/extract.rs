use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use summary_api::{ChangeRecord, EntityId, OpKind};

use crate::stats::PipelineStats;
use crate::PipelineError;

/// Почему запись не дала id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// В документе / selector'е нет `_id`.
    MissingId,
    /// `_id` есть, но не строка и не ObjectId.
    UnsupportedId,
    /// Update без selector'а (`o2`).
    MissingSelector,
    /// Операция не insert и не update.
    UntrackedOp,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DropReason::MissingId => f.write_str("missing _id"),
            DropReason::UnsupportedId => f.write_str("unsupported _id type"),
            DropReason::MissingSelector => f.write_str("update without selector"),
            DropReason::UntrackedOp => f.write_str("untracked op"),
        }
    }
}

/// Извлечь id затронутого документа.
///
/// Insert — `_id` из объекта операции. Update — `_id` из selector'а:
/// объект update'а может быть частичной delta (`$set`) без `_id`.
pub fn extract_entity_id(record: &ChangeRecord) -> Result<EntityId, DropReason> {
    let holder = match record.op {
        OpKind::Insert => &record.object,
        OpKind::Update => record.selector.as_ref().ok_or(DropReason::MissingSelector)?,
        _ => return Err(DropReason::UntrackedOp),
    };
    let id = holder.get("_id").ok_or(DropReason::MissingId)?;
    entity_id_from_json(id).ok_or(DropReason::UnsupportedId)
}

/// `"abc"` → `Key`, `{"$oid": "<24 hex>"}` → `ObjectId`, остальное `None`.
pub fn entity_id_from_json(value: &Value) -> Option<EntityId> {
    match value {
        Value::String(key) => Some(EntityId::Key(key.clone())),
        Value::Object(map) if map.len() == 1 => {
            let hex = map.get("$oid")?.as_str()?;
            if hex.len() == 24 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                Some(EntityId::ObjectId(hex.to_ascii_lowercase()))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Запустить стадию извлечения: ChangeRecord → EntityId.
///
/// Записи без id не останавливают пайплайн, они логируются и считаются.
/// Дубликаты не схлопываются.
pub(crate) fn spawn_extractor(
    mut rx: mpsc::Receiver<ChangeRecord>,
    tx: mpsc::Sender<EntityId>,
    stats: Arc<PipelineStats>,
) -> JoinHandle<Result<(), PipelineError>> {
    tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            match extract_entity_id(&record) {
                Ok(id) => {
                    stats.id_extracted();
                    if tx.send(id).await.is_err() {
                        tracing::debug!("extractor: downstream closed");
                        break;
                    }
                }
                Err(reason) => {
                    stats.record_dropped();
                    tracing::debug!(
                        position = %record.position,
                        op = %record.op,
                        %reason,
                        "extractor: record dropped"
                    );
                }
            }
        }
        Ok(())
    })
}
