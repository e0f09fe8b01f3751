use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a test-friendly tracing subscriber, filtered by `RUST_LOG`.
pub fn init_test_tracing() {
    let _ = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
