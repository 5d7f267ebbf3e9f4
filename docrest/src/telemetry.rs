/// Installs a `tracing` subscriber for applications embedding docrest.
///
/// Output is formatted by `tracing-subscriber` and filtered through the `RUST_LOG`
/// environment variable:
/// - `RUST_LOG=info` - Show info, warn, and error messages
/// - `RUST_LOG=docrest_core=debug` - Compiled pipelines and per-operation outcomes
/// - `RUST_LOG=docrest_core=trace` - Also every hook and backend call
///
/// Returns `false` if a global subscriber was already installed, in which case the
/// existing one is kept.
///
/// # Example
///
/// ```ignore
/// docrest::telemetry::setup_tracing();
/// tracing::info!("Application started");
/// ```
pub fn setup_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .is_ok()
}
