mod log;
mod store;

use std::sync::Arc;

use serde_json::json;

use summary_api::{EntityId, OpKind, Position, RawSeries};

pub use log::MemoryChangeLog;
pub use store::{MemoryEntityStore, MemorySummaryStore};

/// Namespace raw-серий по умолчанию.
pub const DEFAULT_NAMESPACE: &str = "metrics.raw";

/// `_id` в том виде, в каком его пишет оплог (relaxed extended JSON).
pub fn entity_id_json(id: &EntityId) -> serde_json::Value {
    match id {
        EntityId::ObjectId(hex) => json!({ "$oid": hex }),
        EntityId::Key(key) => json!(key),
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryDatabase
// ═══════════════════════════════════════════════════════════════

/// In-memory база: лог + raw-серии + сводки.
///
/// Запись серии через `insert_series` / `update_series` одновременно
/// меняет entity store и дописывает соответствующую запись в лог,
/// так же, как это делает реальный оплог.
pub struct MemoryDatabase {
    pub log: Arc<MemoryChangeLog>,
    pub entities: Arc<MemoryEntityStore>,
    pub summaries: Arc<MemorySummaryStore>,
    namespace: String,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl MemoryDatabase {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            log: Arc::new(MemoryChangeLog::new()),
            entities: Arc::new(MemoryEntityStore::new()),
            summaries: Arc::new(MemorySummaryStore::new()),
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Вставить серию: insert в лог с полным документом.
    pub async fn insert_series(&self, id: EntityId, raw: RawSeries) -> Position {
        let mut object = json!({
            "key": raw.key,
            "at": raw.at,
            "values": json!(raw.values),
        });
        object["_id"] = entity_id_json(&id);
        self.entities.put(id, raw).await;
        self.log.append_op(OpKind::Insert, &self.namespace, object, None)
    }

    /// Обновить серию: update в лог, id только в selector'е.
    pub async fn update_series(&self, id: EntityId, raw: RawSeries) -> Position {
        let object = json!({
            "$set": { "values": json!(raw.values) },
        });
        let selector = json!({ "_id": entity_id_json(&id) });
        self.entities.put(id, raw).await;
        self.log.append_op(OpKind::Update, &self.namespace, object, Some(selector))
    }

    /// Удалить серию без записи в лог (конкурентное удаление).
    pub async fn remove_series(&self, id: &EntityId) -> Option<RawSeries> {
        self.entities.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    use summary_api::{ChangeFilter, ChangeSource, Datapoint, EntityStore, StartAt};

    use super::*;

    fn raw(values: &[f64]) -> RawSeries {
        RawSeries {
            key: "http.latency".into(),
            at: 60,
            values: values.iter().map(|&value| Datapoint { at_ms: 60_000, value }).collect(),
        }
    }

    #[tokio::test]
    async fn insert_and_update_produce_oplog_shaped_records() {
        let db = MemoryDatabase::default();
        let id = EntityId::ObjectId("65a1f0c2e4b0a1b2c3d4e5f6".into());

        let p1 = db.insert_series(id.clone(), raw(&[1.0])).await;
        let p2 = db.update_series(id.clone(), raw(&[1.0, 2.0])).await;
        assert!(p2 > p1);
        db.log.close();

        let mut stream = db.log.subscribe(&ChangeFilter::all(StartAt::AtOrAfter(p1))).await.unwrap();
        let insert = stream.next().await.unwrap().unwrap();
        assert_eq!(insert.op, OpKind::Insert);
        assert_eq!(insert.namespace, "metrics.raw");
        assert_eq!(insert.object["_id"], json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}));
        assert_eq!(insert.object["values"], json!([{"at_ms": 60_000, "value": 1.0}]));

        let update = stream.next().await.unwrap().unwrap();
        assert_eq!(update.op, OpKind::Update);
        assert!(update.object.get("_id").is_none());
        assert_eq!(update.object["$set"]["values"].as_array().map(Vec::len), Some(2));
        assert_eq!(update.selector, Some(json!({"_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}})));

        assert_eq!(db.entities.load(&id).await.unwrap().unwrap().values.len(), 2);
    }

    #[tokio::test]
    async fn remove_series_leaves_log_untouched() {
        let db = MemoryDatabase::default();
        let id = EntityId::Key("k1".into());
        db.insert_series(id.clone(), raw(&[3.0])).await;
        assert!(db.remove_series(&id).await.is_some());
        assert_eq!(db.log.len(), 1);
        assert_eq!(db.entities.load(&id).await.unwrap(), None);
    }
}
