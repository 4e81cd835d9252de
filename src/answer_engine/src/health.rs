//! Health checker (purely informational liveness probe per provider).
//! Grounded in the host's background heartbeat task shape — `tokio::spawn` +
//! `interval` + shutdown-flag check — simplified from a bidirectional
//! canister RPC to a one-way adapter probe that never drives admission
//! control; only the circuit breaker (`retry.rs`) does that.

use crate::adapters::ProviderRegistry;
use crate::core::state::SharedState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug)]
pub struct ProviderHealth {
    pub liveness: Liveness,
    pub checked_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

#[derive(Default)]
pub struct HealthRegistry {
    entries: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        HealthRegistry::default()
    }

    pub async fn snapshot(&self) -> HashMap<String, ProviderHealth> {
        self.entries.read().await.clone()
    }

    async fn record(&self, provider: &str, liveness: Liveness, last_error: Option<String>) {
        self.entries.write().await.insert(
            provider.to_string(),
            ProviderHealth {
                liveness,
                checked_at: Utc::now(),
                last_error,
            },
        );
    }
}

pub fn spawn_health_check_task(state: SharedState, adapters: Arc<ProviderRegistry>, provider_names: Vec<String>) {
    let interval_dur = state.config.health_check_interval;
    info!(interval_s = interval_dur.as_secs(), "spawning health check task");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval_dur);
        interval.tick().await;

        loop {
            interval.tick().await;
            if state.is_shutting_down() {
                info!("health check task shutting down due to shutdown flag");
                break;
            }

            for name in &provider_names {
                let Some(adapter) = adapters.get(name) else {
                    continue;
                };
                match adapter.health_check().await {
                    Ok(_) => state.health.record(name, Liveness::Healthy, None).await,
                    Err(e) => {
                        warn!(provider = name, error = %e, "health probe failed");
                        state
                            .health
                            .record(name, Liveness::Unhealthy, Some(e.message.clone()))
                            .await;
                    }
                }
            }
        }
    });
}

impl Clone for ProviderHealth {
    fn clone(&self) -> Self {
        ProviderHealth {
            liveness: self.liveness,
            checked_at: self.checked_at,
            last_error: self.last_error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_reports_liveness() {
        let registry = HealthRegistry::new();
        registry.record("chatgpt", Liveness::Healthy, None).await;
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot["chatgpt"].liveness, Liveness::Healthy);
    }

    #[tokio::test]
    async fn unknown_provider_absent_from_snapshot() {
        let registry = HealthRegistry::new();
        let snapshot = registry.snapshot().await;
        assert!(!snapshot.contains_key("nonexistent"));
    }
}
