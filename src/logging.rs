use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// environment variable holding the log filter
pub const LOG_VARIABLE: &str = "MFRONT_LOG";

const DEFAULT_FILTER: &str = "mfront=warn";

static INIT: Once = Once::new();

/// the filter directives: `--debug` and `--verbose` take precedence over `MFRONT_LOG`
pub fn filter_directives(verbose: bool, debug: bool) -> String {
    if debug {
        "mfront=debug".to_string()
    } else if verbose {
        "mfront=info".to_string()
    } else {
        std::env::var(LOG_VARIABLE).unwrap_or_else(|_| DEFAULT_FILTER.to_string())
    }
}

/// Installs the subscriber printing the events of the library on stderr. Only the first
/// call has an effect.
pub fn init_tracing(verbose: bool, debug: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::new(filter_directives(verbose, debug));
        // a subscriber installed by the embedding program is kept
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
