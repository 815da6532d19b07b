pub mod builders;
pub mod recording;

use std::sync::{Arc, Once};

use opgraph::exec::{Dispatcher, TokioDispatcher};
use tokio::runtime::Runtime;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// A Tokio runtime whose blocking pool has `workers` threads, plus a
/// dispatcher feeding it.
///
/// Keep the runtime alive for as long as the dispatcher is used.
pub fn pool_dispatcher(workers: usize) -> (Runtime, Arc<dyn Dispatcher>) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(workers)
        .thread_name("opgraph-test-worker")
        .build()
        .expect("failed to build test runtime");
    let dispatcher: Arc<dyn Dispatcher> = Arc::new(TokioDispatcher::new(runtime.handle().clone()));
    (runtime, dispatcher)
}
