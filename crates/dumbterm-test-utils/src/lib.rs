pub mod harness;
pub mod surface;

pub use harness::{drain, poll_session, wait_for_end, wait_for_output, Capture};
pub use surface::RecordingSurface;

use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Generous upper bound for a shell to react in CI
pub const SHELL_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("dumbterm=debug,dumbterm_pty=debug,dumbterm_buffer=debug")
            }))
            .with_test_writer()
            .init();
    });
}
