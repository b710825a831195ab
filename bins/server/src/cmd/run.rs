use std::sync::Arc;

use pipeline::Pipeline;
use storage_mongo::MongoBackend;

use crate::config::{RunArgs, Settings};
use crate::error::ServerError;

pub async fn run(args: RunArgs) -> Result<(), ServerError> {
    tracing::info!("oplog-summary starting");

    let settings = Settings::for_run(&args)?;
    tracing::info!(
        namespace = %settings.pipeline.namespace,
        summaries = %settings.namespaces.summary,
        oplog = %settings.namespaces.oplog,
        handoff_buffer = settings.pipeline.handoff_buffer,
        on_missing = ?settings.pipeline.on_missing,
        "resolved settings"
    );

    let backend = Arc::new(MongoBackend::connect(&settings.mongo_url, &settings.namespaces).await?);
    backend.ensure_indexes().await?;

    let pipeline = Pipeline::new(settings.pipeline, backend.clone(), backend.clone(), backend);
    let token = super::shutdown_token();

    let result = pipeline.run(token).await;

    let stats = pipeline.stats();
    tracing::info!(
        records = stats.records,
        extracted = stats.extracted,
        dropped = stats.dropped,
        recomputed = stats.recomputed,
        empty = stats.empty,
        skipped = stats.skipped,
        "pipeline stopped"
    );

    result?;
    tracing::info!("shutdown complete");
    Ok(())
}
