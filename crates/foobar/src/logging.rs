//! Log output
//!
//! Installs a `tracing-subscriber` formatter filtered by `FOOBAR_LOG`
//! (`info` when unset). Safe to call more than once.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the filter directives
pub const LOG_ENV: &str = "FOOBAR_LOG";

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        // another subscriber may already be installed by the embedder
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        tracing::info!("logging ready");
    }
}
