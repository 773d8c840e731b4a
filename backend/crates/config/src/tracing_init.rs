use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `LOG_LEVEL`; `default_level` applies when neither
/// parses.
pub fn init_tracing(default_level: &str) {
    fmt().with_env_filter(build_filter(default_level)).with_target(true).init();
}

fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_from_env("LOG_LEVEL"))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::ENV_LOCK;

    #[test]
    fn falls_back_to_default_level() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        std::env::remove_var("RUST_LOG");
        std::env::remove_var("LOG_LEVEL");
        let filter = build_filter("warn");
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn log_level_applies_when_rust_log_is_unset() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");
        std::env::remove_var("RUST_LOG");
        std::env::set_var("LOG_LEVEL", "debug");
        let filter = build_filter("warn");
        std::env::remove_var("LOG_LEVEL");
        assert_eq!(filter.to_string(), "debug");
    }
}
