pub mod env;
pub mod tracing_init;

pub use env::{parse_branches, AppConfig, BranchConfig, StreamFlags};
pub use tracing_init::init_tracing;

#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::Mutex;

    /// Serializes tests that read or write process environment variables.
    pub static ENV_LOCK: Mutex<()> = Mutex::new(());
}
