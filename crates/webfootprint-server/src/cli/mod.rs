//! CLI subcommand implementations for the webfootprint binary.

pub mod analyze;
pub mod serve;

use tracing_subscriber::EnvFilter;

/// Initialize tracing with env-based filtering on top of a default
/// directive. `RUST_LOG` overrides always win.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(default_directive.parse().unwrap()),
        )
        .init();
}
