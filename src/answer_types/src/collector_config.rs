use serde::{Deserialize, Serialize};

/// Static, per-provider configuration entry within a collector's fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub priority: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub timeout_ms: u64,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_true")]
    pub fallback_on_failure: bool,
}

fn default_true() -> bool {
    true
}

/// Static configuration for one logical collector (e.g. "chatgpt").
///
/// `providers` is kept in the order it was configured; `sorted_providers`
/// resolves the actual attempt order, breaking priority ties by original
/// insertion position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub timeout_ms: u64,
    #[serde(default)]
    pub retries: u32,
    pub priority_rank: u32,
    pub providers: Vec<ProviderSpec>,
}

impl CollectorConfig {
    /// Enabled providers ordered by ascending priority, ties broken by
    /// original insertion order (the first one inserted wins a tie).
    pub fn sorted_providers(&self) -> Vec<&ProviderSpec> {
        let mut indexed: Vec<(usize, &ProviderSpec)> = self
            .providers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.enabled)
            .collect();
        indexed.sort_by_key(|(idx, p)| (p.priority, *idx));
        indexed.into_iter().map(|(_, p)| p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(name: &str, priority: u32) -> ProviderSpec {
        ProviderSpec {
            name: name.to_string(),
            priority,
            enabled: true,
            timeout_ms: 1000,
            retries: 0,
            fallback_on_failure: true,
        }
    }

    #[test]
    fn tie_broken_by_insertion_order() {
        let config = CollectorConfig {
            name: "chatgpt".into(),
            enabled: true,
            timeout_ms: 1000,
            retries: 0,
            priority_rank: 0,
            providers: vec![provider("a", 1), provider("b", 1), provider("c", 0)],
        };
        let names: Vec<&str> = config
            .sorted_providers()
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn disabled_providers_excluded() {
        let mut p = provider("a", 0);
        p.enabled = false;
        let config = CollectorConfig {
            name: "chatgpt".into(),
            enabled: true,
            timeout_ms: 1000,
            retries: 0,
            priority_rank: 0,
            providers: vec![p, provider("b", 1)],
        };
        let names: Vec<&str> = config
            .sorted_providers()
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["b"]);
    }
}
