use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "scout=info";

/// Human-facing reports go to stdout; everything logged goes to stderr.
/// `SCOUT_LOG` takes the usual env-filter directives.
pub fn init() {
    let filter = EnvFilter::try_from_env("SCOUT_LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
