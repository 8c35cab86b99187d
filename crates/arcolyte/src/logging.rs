//! Process-wide `tracing` subscriber setup.

use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "ARCOLYTE_LOG";

const DEFAULT_FILTER: &str = "arcolyte=info";

static INIT: Once = Once::new();

/// Install the `fmt` subscriber filtered by `ARCOLYTE_LOG`.
///
/// Safe to call any number of times from any thread. If the host process
/// already installed a global subscriber, that one is kept.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_thread_names(true))
            .try_init()
            .is_ok();
        tracing::debug!(installed, "logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        std::thread::spawn(init).join().unwrap();
        assert!(INIT.is_completed());
    }
}
