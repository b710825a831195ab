use std::future::Future;
use std::pin::Pin;

use futures::TryStreamExt;
use mongodb::Cursor;
use mongodb::bson::{Bson, Document, Timestamp, doc};

use summary_api::{ChangeFilter, ChangeRecord, ChangeStream, OpKind, Position, StartAt, StoreError};

use crate::store_err;

// ═══════════════════════════════════════════════════════════════
//  Oplog document ↔ ChangeRecord
// ═══════════════════════════════════════════════════════════════

pub(crate) fn to_timestamp(position: Position) -> Timestamp {
    Timestamp { time: position.time, increment: position.increment }
}

/// Документ `local.oplog.rs` → `ChangeRecord`.
///
/// `h` и `v` могут отсутствовать (новые версии сервера не пишут `h`),
/// тогда 0. Payload'ы переводятся в relaxed extended JSON.
pub fn decode_oplog(doc: &Document) -> Result<ChangeRecord, StoreError> {
    let ts = doc
        .get_timestamp("ts")
        .map_err(|e| StoreError::decode(format!("oplog ts: {e}")))?;
    let op = doc
        .get_str("op")
        .map_err(|e| StoreError::decode(format!("oplog op: {e}")))?;

    let history_id = match doc.get("h") {
        Some(Bson::Int64(h)) => *h,
        Some(Bson::Int32(h)) => i64::from(*h),
        _ => 0,
    };
    let version = match doc.get("v") {
        Some(Bson::Int32(v)) => *v,
        Some(Bson::Int64(v)) => {
            i32::try_from(*v).map_err(|_| StoreError::decode(format!("oplog v out of range: {v}")))?
        }
        _ => 0,
    };

    Ok(ChangeRecord {
        position: Position::new(ts.time, ts.increment),
        history_id,
        version,
        op: OpKind::from_code(op),
        namespace: doc.get_str("ns").unwrap_or_default().to_string(),
        object: doc.get("o").cloned().map(Bson::into_relaxed_extjson).unwrap_or_default(),
        selector: doc.get("o2").cloned().map(Bson::into_relaxed_extjson),
    })
}

/// `ChangeFilter` → query для tailable cursor'а по оплогу.
pub fn oplog_query(filter: &ChangeFilter) -> Document {
    let mut query = match filter.start {
        StartAt::After(p) => doc! { "ts": { "$gt": to_timestamp(p) } },
        StartAt::AtOrAfter(p) => doc! { "ts": { "$gte": to_timestamp(p) } },
    };
    if let Some(ref ns) = filter.namespace {
        query.insert("ns", ns.as_str());
    }
    if !filter.ops.is_empty() {
        let codes: Vec<String> = filter.ops.iter().map(|op| op.code().to_string()).collect();
        query.insert("op", doc! { "$in": codes });
    }
    query
}

// ═══════════════════════════════════════════════════════════════
//  MongoChangeStream
// ═══════════════════════════════════════════════════════════════

/// Tailable-await cursor по оплогу. Драйвер держит getMore открытым
/// на сервере, пока нет новых записей.
pub(crate) struct MongoChangeStream {
    pub(crate) cursor: Cursor<Document>,
}

impl ChangeStream for MongoChangeStream {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            match self.cursor.try_next().await {
                Ok(Some(doc)) => decode_oplog(&doc).map(Some),
                Ok(None) => Ok(None),
                Err(e) => Err(store_err("oplog cursor", e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_insert() {
        let oid = ObjectId::parse_str("65a1f0c2e4b0a1b2c3d4e5f6").unwrap();
        let doc = doc! {
            "ts": Timestamp { time: 1_700_000_000, increment: 3 },
            "h": -7_355_020_474_190_174_044_i64,
            "v": 2,
            "op": "i",
            "ns": "metrics.raw",
            "o": { "_id": oid, "key": "cpu", "at": 1_700_000_040_i64 },
        };
        let record = decode_oplog(&doc).unwrap();
        assert_eq!(record.position, Position::new(1_700_000_000, 3));
        assert_eq!(record.history_id, -7_355_020_474_190_174_044);
        assert_eq!(record.version, 2);
        assert_eq!(record.op, OpKind::Insert);
        assert_eq!(record.namespace, "metrics.raw");
        assert_eq!(record.object["_id"], json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"}));
        assert_eq!(record.selector, None);
    }

    #[test]
    fn decodes_update_selector_and_missing_h() {
        let doc = doc! {
            "ts": Timestamp { time: 10, increment: 1 },
            "op": "u",
            "ns": "metrics.raw",
            "o": { "$set": { "value": 7 } },
            "o2": { "_id": "abc" },
        };
        let record = decode_oplog(&doc).unwrap();
        assert_eq!(record.history_id, 0);
        assert_eq!(record.op, OpKind::Update);
        assert_eq!(record.selector, Some(json!({"_id": "abc"})));
    }

    #[test]
    fn rejects_document_without_ts() {
        let doc = doc! { "op": "n", "ns": "" };
        let err = decode_oplog(&doc).unwrap_err();
        assert_eq!(err.kind(), summary_api::ErrorKind::Decode);
    }

    #[test]
    fn rejects_version_outside_i32() {
        let doc = doc! {
            "ts": Timestamp { time: 10, increment: 1 },
            "v": i64::from(i32::MAX) + 1,
            "op": "n",
            "ns": "",
            "o": {},
        };
        let err = decode_oplog(&doc).unwrap_err();
        assert_eq!(err.kind(), summary_api::ErrorKind::Decode);

        let doc = doc! { "ts": Timestamp { time: 10, increment: 2 }, "v": 2_i64, "op": "n", "ns": "" };
        assert_eq!(decode_oplog(&doc).unwrap().version, 2);
    }

    #[test]
    fn query_for_pipeline_filter() {
        let filter = ChangeFilter {
            start: StartAt::After(Position::new(5, 2)),
            namespace: Some("metrics.raw".into()),
            ops: vec![OpKind::Insert, OpKind::Update],
        };
        let expected = doc! {
            "ts": { "$gt": Timestamp { time: 5, increment: 2 } },
            "ns": "metrics.raw",
            "op": { "$in": ["i", "u"] },
        };
        assert_eq!(oplog_query(&filter), expected);
    }

    #[test]
    fn query_for_tail_is_inclusive_and_unfiltered() {
        let filter = ChangeFilter::all(StartAt::AtOrAfter(Position::new(5, 2)));
        assert_eq!(oplog_query(&filter), doc! { "ts": { "$gte": Timestamp { time: 5, increment: 2 } } });
    }
}
