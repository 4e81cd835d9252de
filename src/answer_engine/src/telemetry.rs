use crate::config::LogFormat;
use tracing::error;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Wires a compact or bunyan-JSON `tracing` subscriber depending on
/// `LOG_FORMAT`, and installs a panic hook that logs structurally before
/// unwinding. Mirrors the host binary's `main()` setup.
pub fn init(format: LogFormat) -> tracing_appender::non_blocking::WorkerGuard {
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("answer_engine=info,tower_http=info"));

    match format {
        LogFormat::Json => {
            let registry = tracing_subscriber::registry()
                .with(env_filter)
                .with(JsonStorageLayer)
                .with(BunyanFormattingLayer::new(
                    "answer_engine".into(),
                    non_blocking_writer,
                ));
            registry.init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_writer(non_blocking_writer);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
        }
    }

    std::panic::set_hook(Box::new(|panic_info| {
        error!(target: "panic", "{}", panic_info);
    }));

    guard
}
