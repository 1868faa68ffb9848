use tracing::info;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, prelude::*};

/// Installs the global tracing subscriber. Verbosity follows `RUST_LOG`.
pub fn init_telemetry() -> Result<(), Box<dyn std::error::Error>> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(stdout_layer)
        .try_init()
        .map_err(|e| format!("Failed to initialize tracing: {}", e))?;

    info!(
        "Tracing initialized for {} {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}
