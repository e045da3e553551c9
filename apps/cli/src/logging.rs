use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "harvester=info,harvester_core=info";

/// Log to stderr so stdout stays clean for command output. `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            "harvester=debug,harvester_core=debug".into()
        } else {
            DEFAULT_FILTER.into()
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
