//! Graceful shutdown: signal handling and draining, generalized from the
//! host's `graceful_shutdown_signal`/`wait_for_jobs_completion` pair
//! (unregistration and hard-exit-on-fatal-error were specific to the
//! canister-registered node and have no counterpart here).

use crate::core::state::SharedState;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub async fn graceful_shutdown_signal(state: SharedState) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C signal");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
        info!("received SIGTERM signal");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let flag_monitor = async {
        loop {
            if state.is_shutting_down() {
                info!("internal shutdown flag detected");
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = flag_monitor => {},
    }
    info!("termination signal detected, setting shutdown flag");
    state.shutdown.store(true, AtomicOrdering::SeqCst);
}

/// Waits for in-flight executions to drain, generalizing the host's
/// `wait_for_jobs_completion` from its `job_streams` registry to the
/// orchestrator's active-execution counter.
pub async fn wait_for_active_executions(state: SharedState) {
    let max_wait = Duration::from_secs(120);
    let poll_interval = Duration::from_secs(2);
    let start_time = Instant::now();
    info!("checking for active executions before final shutdown");
    loop {
        let active = state
            .metrics
            .current_active_executions
            .load(AtomicOrdering::Relaxed);
        if active == 0 {
            info!("all executions drained");
            break;
        }
        let elapsed = start_time.elapsed();
        if elapsed >= max_wait {
            warn!(
                active,
                timeout_s = max_wait.as_secs_f32(),
                "timeout waiting for executions to drain, forcing shutdown"
            );
            break;
        }
        info!(
            active,
            elapsed_s = elapsed.as_secs_f32(),
            "waiting for active execution(s) to finish"
        );
        tokio::time::sleep(poll_interval).await;
    }
}
