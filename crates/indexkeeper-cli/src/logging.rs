// Logging and verbosity control

use tracing_subscriber::EnvFilter;

/// Log level implied by the verbosity flags, falling back to the configured level
pub fn effective_level(configured: &str, verbose: bool, quiet: bool) -> String {
    if quiet {
        "error".to_string()
    } else if verbose {
        "debug".to_string()
    } else {
        configured.to_string()
    }
}

/// Build the filter: `RUST_LOG` wins, otherwise `level` for this tool's crates
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!(
            "warn,indexkeeper_actions={level},indexkeeper_http={level},indexkeeper_cli={level}",
            level = level
        ))
        .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Initialize logging to stderr; a second call is a no-op
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
