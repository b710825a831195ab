use summary_api::{ChangeSource, Position};

use crate::PipelineError;

/// Позиция, после которой продолжать чтение лога: позиция самой свежей
/// записи на момент старта.
///
/// Вызывается до подписки. Подписка запрашивает строго `> position`:
/// сама запись уже была в логе до нас.
pub async fn resolve_resume_position(source: &dyn ChangeSource) -> Result<Position, PipelineError> {
    match source.latest().await {
        Ok(Some(record)) => Ok(record.position),
        Ok(None) => Err(PipelineError::NoResumePoint),
        Err(e) => Err(PipelineError::SourceUnavailable(e)),
    }
}
