use clap::Parser;
use std::collections::HashMap;
use std::time::Duration;

/// CLI surface for the demo binary. Library callers build `Config` directly
/// or via `Config::from_env`; these flags only override the corresponding
/// environment variable when present.
#[derive(Parser, Debug)]
#[command(author, version, about = "Answer-engine orchestrator demo")]
pub struct Args {
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub concurrency: Option<usize>,
    #[arg(long)]
    pub mock_mode: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_reset_timeout: Duration,
    pub batch_size: usize,
    /// Bounds concurrent in-flight provider work independently of
    /// `batch_size` (which only bounds how many requests start per batch).
    /// `None` falls back to `batch_size`, the prior behavior.
    pub concurrency: Option<usize>,
    pub inter_batch_delay: Duration,
    pub verbose_logs: bool,
    pub log_format: LogFormat,
    pub health_check_interval: Duration,
    pub snapshot_poll_interval: Duration,
    pub snapshot_poll_max_attempts: u32,
    pub mock_mode: bool,
    pub provider_credentials: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl Config {
    /// Reads every recognized environment variable, falling back to the
    /// defaults in `SPEC_FULL.md` §6, the same direct `std::env::var` style
    /// the host binary uses for `LOG_FORMAT`.
    pub fn from_env() -> Self {
        Config {
            max_retries: env_u32("MAX_RETRIES", 3),
            retry_base_delay: Duration::from_millis(env_u64("RETRY_BASE_DELAY_MS", 1000)),
            circuit_breaker_threshold: env_u32("CIRCUIT_BREAKER_THRESHOLD", 5),
            circuit_breaker_reset_timeout: Duration::from_millis(env_u64(
                "CIRCUIT_BREAKER_RESET_TIMEOUT_MS",
                60_000,
            )),
            batch_size: env_u64("BATCH_SIZE", 3) as usize,
            concurrency: std::env::var("CONCURRENCY").ok().and_then(|v| v.parse().ok()),
            inter_batch_delay: Duration::from_millis(env_u64("INTER_BATCH_DELAY_MS", 1000)),
            verbose_logs: env_bool("VERBOSE_LOGS", false),
            log_format: match std::env::var("LOG_FORMAT").unwrap_or_default().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Compact,
            },
            health_check_interval: Duration::from_millis(env_u64(
                "HEALTH_CHECK_INTERVAL_MS",
                60_000,
            )),
            snapshot_poll_interval: Duration::from_millis(env_u64(
                "SNAPSHOT_POLL_INTERVAL_MS",
                10_000,
            )),
            snapshot_poll_max_attempts: env_u32("SNAPSHOT_POLL_MAX_ATTEMPTS", 60),
            mock_mode: env_bool("MOCK_MODE", false),
            provider_credentials: collect_provider_credentials(),
        }
    }

    pub fn apply_args(mut self, args: &Args) -> Self {
        if let Some(bs) = args.batch_size {
            self.batch_size = bs;
        }
        if args.concurrency.is_some() {
            self.concurrency = args.concurrency;
        }
        if args.mock_mode {
            self.mock_mode = true;
        }
        self
    }

    pub fn credential(&self, provider: &str) -> Option<&str> {
        self.provider_credentials.get(provider).map(String::as_str)
    }
}

/// Per-provider credentials are recognized by the `<PROVIDER>_API_KEY`
/// convention; anything matching is folded into `provider_credentials`
/// keyed by the lowercased provider name.
fn collect_provider_credentials() -> HashMap<String, String> {
    std::env::vars()
        .filter_map(|(k, v)| {
            k.strip_suffix("_API_KEY")
                .map(|prefix| (prefix.to_lowercase(), v))
        })
        .collect()
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing_accepts_common_truthy_spellings() {
        for v in ["1", "true", "TRUE", "yes"] {
            unsafe { std::env::set_var("TEST_FLAG_X", v) };
            assert!(env_bool("TEST_FLAG_X", false));
        }
        unsafe { std::env::remove_var("TEST_FLAG_X") };
    }

    #[test]
    fn missing_var_falls_back_to_default() {
        unsafe { std::env::remove_var("TEST_MISSING_VAR") };
        assert_eq!(env_u32("TEST_MISSING_VAR", 7), 7);
    }
}
