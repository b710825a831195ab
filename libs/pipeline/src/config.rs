use serde::Deserialize;

// ═══════════════════════════════════════════════════════════════
//  Missing Entity Policy
// ═══════════════════════════════════════════════════════════════

/// Что делать, если документ исчез до пересчёта.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEntityPolicy {
    /// Остановить пайплайн с `NotFound`.
    #[default]
    Fail,
    /// Залогировать, посчитать и продолжить.
    Skip,
}

impl std::str::FromStr for MissingEntityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(MissingEntityPolicy::Fail),
            "skip" => Ok(MissingEntityPolicy::Skip),
            other => Err(format!("unknown missing-entity policy '{other}', expected fail|skip")),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pipeline Config
// ═══════════════════════════════════════════════════════════════

/// Конфигурация пайплайна: передаётся в `Pipeline::new`, глобального
/// состояния нет. Из файла/CLI собирается в бинаре.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Namespace raw-серий, за которым следит подписка.
    pub namespace: String,
    /// Ёмкость handoff каналов между стадиями (1 ≈ unbuffered).
    pub handoff_buffer: usize,
    pub on_missing: MissingEntityPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            namespace: "metrics.raw".into(),
            handoff_buffer: 1,
            on_missing: MissingEntityPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.namespace, "metrics.raw");
        assert_eq!(config.handoff_buffer, 1);
        assert_eq!(config.on_missing, MissingEntityPolicy::Fail);
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("skip".parse::<MissingEntityPolicy>(), Ok(MissingEntityPolicy::Skip));
        assert_eq!("fail".parse::<MissingEntityPolicy>(), Ok(MissingEntityPolicy::Fail));
        assert!("ignore".parse::<MissingEntityPolicy>().is_err());
    }
}
