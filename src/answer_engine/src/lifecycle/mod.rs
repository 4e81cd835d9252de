mod shutdown;

pub use shutdown::{graceful_shutdown_signal, wait_for_active_executions};
