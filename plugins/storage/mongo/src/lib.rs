//! MongoDB backend: oplog как `ChangeSource`, коллекция raw-серий как
//! `EntityStore`, коллекция сводок как `SummaryStore`.
//!
//! Оплог читается tailable-await cursor'ом по `local.oplog.rs`,
//! поэтому нужен replica set (standalone mongod оплог не ведёт).

mod oplog;

use std::future::Future;
use std::pin::Pin;

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{self, Document, doc};
use mongodb::options::{CursorType, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use serde::Deserialize;

use summary_api::{
    ChangeFilter, ChangeRecord, ChangeSource, ChangeStream, Datapoint, EntityId, EntityStore,
    RawSeries, SevenNumberSummary, StoreError, SummaryStore,
};

pub use oplog::{decode_oplog, oplog_query};

use oplog::MongoChangeStream;

pub const DEFAULT_OPLOG_NAMESPACE: &str = "local.oplog.rs";
pub const DEFAULT_RAW_NAMESPACE: &str = "metrics.raw";
pub const DEFAULT_SUMMARY_NAMESPACE: &str = "metrics.summary";

// ═══════════════════════════════════════════════════════════════
//  Namespaces
// ═══════════════════════════════════════════════════════════════

/// `database.collection`. Разбивается по первой точке: имя коллекции
/// само может содержать точки (`oplog.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn parse(ns: &str) -> Result<Self, StoreError> {
        match ns.split_once('.') {
            Some((db, coll)) if !db.is_empty() && !coll.is_empty() => Ok(Self {
                database: db.to_string(),
                collection: coll.to_string(),
            }),
            _ => Err(StoreError::connect(format!("invalid namespace '{ns}': expected 'database.collection'"))),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

#[derive(Debug, Clone)]
pub struct MongoNamespaces {
    pub oplog: String,
    pub raw: String,
    pub summary: String,
}

impl Default for MongoNamespaces {
    fn default() -> Self {
        Self {
            oplog: DEFAULT_OPLOG_NAMESPACE.into(),
            raw: DEFAULT_RAW_NAMESPACE.into(),
            summary: DEFAULT_SUMMARY_NAMESPACE.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Raw documents
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct RawDoc {
    key: String,
    at: i64,
    #[serde(default)]
    values: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
struct RawPoint {
    at: bson::DateTime,
    value: f64,
}

impl From<RawDoc> for RawSeries {
    fn from(doc: RawDoc) -> Self {
        RawSeries {
            key: doc.key,
            at: doc.at,
            values: doc
                .values
                .into_iter()
                .map(|p| Datapoint { at_ms: p.at.timestamp_millis(), value: p.value })
                .collect(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MongoBackend
// ═══════════════════════════════════════════════════════════════

/// Все три роли на одном `Client` (общий пул соединений).
pub struct MongoBackend {
    oplog: Collection<Document>,
    raw: Collection<RawDoc>,
    summary: Collection<SevenNumberSummary>,
}

impl MongoBackend {
    pub async fn connect(url: &str, namespaces: &MongoNamespaces) -> Result<Self, StoreError> {
        let oplog_ns = Namespace::parse(&namespaces.oplog)?;
        let raw_ns = Namespace::parse(&namespaces.raw)?;
        let summary_ns = Namespace::parse(&namespaces.summary)?;

        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| StoreError::connect(format!("mongo connect '{url}': {e}")))?;

        tracing::info!(oplog = %oplog_ns, raw = %raw_ns, summary = %summary_ns, "mongo backend ready");

        Ok(Self {
            oplog: client.database(&oplog_ns.database).collection(&oplog_ns.collection),
            raw: client.database(&raw_ns.database).collection(&raw_ns.collection),
            summary: client.database(&summary_ns.database).collection(&summary_ns.collection),
        })
    }

    /// Уникальный индекс `{key: 1, at: 1}` на коллекции сводок.
    /// Идемпотентно.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { "key": 1, "at": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.summary
            .create_index(index)
            .await
            .map_err(|e| store_err("create summary index", e))?;
        Ok(())
    }
}

impl ChangeSource for MongoBackend {
    fn latest(&self) -> Pin<Box<dyn Future<Output = Result<Option<ChangeRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let last = self
                .oplog
                .find_one(doc! {})
                .sort(doc! { "$natural": -1 })
                .await
                .map_err(|e| store_err("latest oplog entry", e))?;
            last.as_ref().map(decode_oplog).transpose()
        })
    }

    fn subscribe(
        &self,
        filter: &ChangeFilter,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn ChangeStream>, StoreError>> + Send + '_>> {
        let query = oplog_query(filter);
        Box::pin(async move {
            tracing::debug!(%query, "opening tailable oplog cursor");
            let cursor = self
                .oplog
                .find(query)
                .sort(doc! { "$natural": 1 })
                .cursor_type(CursorType::TailableAwait)
                .no_cursor_timeout(true)
                .await
                .map_err(|e| store_err("open oplog cursor", e))?;
            Ok(Box::new(MongoChangeStream { cursor }) as Box<dyn ChangeStream>)
        })
    }
}

impl EntityStore for MongoBackend {
    fn load(&self, id: &EntityId) -> Pin<Box<dyn Future<Output = Result<Option<RawSeries>, StoreError>> + Send + '_>> {
        let filter = id_filter(id);
        Box::pin(async move {
            let doc = self
                .raw
                .find_one(filter?)
                .await
                .map_err(|e| store_err("load raw series", e))?;
            Ok(doc.map(RawSeries::from))
        })
    }
}

impl SummaryStore for MongoBackend {
    fn upsert(&self, summary: &SevenNumberSummary) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let summary = summary.clone();
        Box::pin(async move {
            self.summary
                .replace_one(doc! { "key": summary.key.as_str(), "at": summary.at }, &summary)
                .upsert(true)
                .await
                .map_err(|e| store_err("upsert summary", e))?;
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

fn id_filter(id: &EntityId) -> Result<Document, StoreError> {
    match id {
        EntityId::ObjectId(hex) => {
            let oid = ObjectId::parse_str(hex).map_err(|e| StoreError::decode(format!("bad ObjectId '{hex}': {e}")))?;
            Ok(doc! { "_id": oid })
        }
        EntityId::Key(key) => Ok(doc! { "_id": key.as_str() }),
    }
}

/// Driver error → `StoreError` с подходящим kind.
pub(crate) fn store_err(context: &str, e: mongodb::error::Error) -> StoreError {
    use mongodb::error::ErrorKind as Kind;
    let message = format!("{context}: {e}");
    match e.kind.as_ref() {
        Kind::BsonDeserialization(_) | Kind::BsonSerialization(_) => StoreError::decode(message),
        Kind::InvalidArgument { .. } => StoreError::connect(message),
        _ => StoreError::transport(message),
    }
}
