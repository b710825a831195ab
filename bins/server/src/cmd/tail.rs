use std::io::Write;

use storage_mongo::MongoBackend;

use crate::config::{Settings, TailArgs};
use crate::error::ServerError;

/// Печатает каждую запись оплога одной JSON строкой в stdout.
pub async fn run(args: TailArgs) -> Result<(), ServerError> {
    let settings = Settings::for_tail(&args)?;
    let backend = MongoBackend::connect(&settings.mongo_url, &settings.namespaces).await?;
    let token = super::shutdown_token();

    let stdout = std::io::stdout();
    pipeline::tail_log(&backend, token, |record| {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(position = %record.position, error = %e, "unserializable record");
                return;
            }
        };
        let mut out = stdout.lock();
        if let Err(e) = writeln!(out, "{line}") {
            tracing::warn!(error = %e, "stdout write failed");
        }
    })
    .await?;
    Ok(())
}
