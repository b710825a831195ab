use std::path::Path;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use pipeline::{MissingEntityPolicy, PipelineConfig};
use storage_mongo::MongoNamespaces;

use crate::error::ServerError;

pub const DEFAULT_CONFIG_PATH: &str = "oplog-summary.toml";
pub const DEFAULT_MONGO_URL: &str = "mongodb://localhost";

#[derive(Parser)]
#[command(name = "oplog-summary", about = "Пересчёт seven-number summary по оплогу MongoDB")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Следить за оплогом и пересчитывать сводки
    Run(RunArgs),
    /// Печатать записи оплога как JSON lines, начиная с последней
    Tail(TailArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ConnectArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, env = "OPLOG_SUMMARY_CONFIG")]
    pub config: Option<String>,

    /// MongoDB connection string
    #[arg(long, env = "MONGO_URL")]
    pub mongo_url: Option<String>,

    /// Namespace оплога
    #[arg(long, env = "OPLOG_SUMMARY_OPLOG_NAMESPACE")]
    pub oplog_namespace: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Namespace raw-серий (`db.collection`)
    #[arg(long, env = "OPLOG_SUMMARY_NAMESPACE")]
    pub namespace: Option<String>,

    /// Namespace сводок (`db.collection`)
    #[arg(long, env = "OPLOG_SUMMARY_SUMMARY_NAMESPACE")]
    pub summary_namespace: Option<String>,

    /// Ёмкость каналов между стадиями
    #[arg(long, env = "OPLOG_SUMMARY_HANDOFF_BUFFER")]
    pub handoff_buffer: Option<usize>,

    /// fail | skip
    #[arg(long, env = "OPLOG_SUMMARY_ON_MISSING")]
    pub on_missing: Option<MissingEntityPolicy>,
}

#[derive(Args, Clone, Debug)]
pub struct TailArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

// ---- TOML Config ----

/// Содержимое конфиг файла. Все поля опциональны: CLI/env перекрывают
/// файл, файл перекрывает defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub mongo_url: Option<String>,
    pub namespace: Option<String>,
    pub summary_namespace: Option<String>,
    pub oplog_namespace: Option<String>,
    pub handoff_buffer: Option<usize>,
    pub on_missing: Option<MissingEntityPolicy>,
}

impl FileConfig {
    /// Явно указанный файл обязан существовать; отсутствие файла по
    /// умолчанию не ошибка.
    pub fn load(explicit: Option<&str>) -> Result<Self, ServerError> {
        let path = explicit.unwrap_or(DEFAULT_CONFIG_PATH);
        if explicit.is_none() && !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        let config = Self::parse(&content)
            .map_err(|detail| ServerError::Config { context: "parse", detail: format!("'{path}': {detail}") })?;
        tracing::info!(config = %path, "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }
}

// ---- Resolved settings ----

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongo_url: String,
    pub namespaces: MongoNamespaces,
    pub pipeline: PipelineConfig,
}

impl Settings {
    pub fn for_run(args: &RunArgs) -> Result<Self, ServerError> {
        let file = FileConfig::load(args.connect.config.as_deref())?;
        Ok(Self::merge(file, &args.connect, Some(args)))
    }

    pub fn for_tail(args: &TailArgs) -> Result<Self, ServerError> {
        let file = FileConfig::load(args.connect.config.as_deref())?;
        Ok(Self::merge(file, &args.connect, None))
    }

    /// defaults < файл < env/CLI.
    fn merge(file: FileConfig, connect: &ConnectArgs, run: Option<&RunArgs>) -> Self {
        let defaults = PipelineConfig::default();
        let mut namespaces = MongoNamespaces::default();

        if let Some(ns) = connect.oplog_namespace.clone().or(file.oplog_namespace) {
            namespaces.oplog = ns;
        }
        if let Some(ns) = run.and_then(|r| r.summary_namespace.clone()).or(file.summary_namespace) {
            namespaces.summary = ns;
        }
        let namespace = run
            .and_then(|r| r.namespace.clone())
            .or(file.namespace)
            .unwrap_or(defaults.namespace);
        namespaces.raw = namespace.clone();

        Self {
            mongo_url: connect
                .mongo_url
                .clone()
                .or(file.mongo_url)
                .unwrap_or_else(|| DEFAULT_MONGO_URL.to_string()),
            namespaces,
            pipeline: PipelineConfig {
                namespace,
                handoff_buffer: run
                    .and_then(|r| r.handoff_buffer)
                    .or(file.handoff_buffer)
                    .unwrap_or(defaults.handoff_buffer),
                on_missing: run
                    .and_then(|r| r.on_missing)
                    .or(file.on_missing)
                    .unwrap_or(defaults.on_missing),
            },
        }
    }
}
