//! Tracing subscriber setup for hosts embedding the pipeline.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber. `RUST_LOG` overrides the default level.
///
/// Does nothing if a global subscriber is already set.
pub fn init(verbose: bool) {
    let default = if verbose {
        "cred_trial=debug"
    } else {
        "cred_trial=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .try_init();
}
