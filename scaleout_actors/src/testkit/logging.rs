use tracing::Level;

/// Routes `tracing` output through the test harness's captured stdout. Safe to call from every
/// test; only the first call installs a subscriber.
pub fn init_test_logging(level: Level) {
  let _ = tracing_subscriber::fmt()
    .with_max_level(level)
    .with_target(false)
    .with_test_writer()
    .try_init();
}
