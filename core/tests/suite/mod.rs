mod reconcile_flow;
mod session_switch;

/// Install a fmt subscriber honoring `RUST_LOG` so a failing scenario can be
/// rerun with core tracing output visible. Safe to call from every test.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
