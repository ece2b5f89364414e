// Logs module - debug-only diagnostic sink
//
// Detaching points stdio at /dev/null, so diagnostics go to the local
// syslog daemon instead. Release builds install no subscriber and every
// event is dropped.

#[cfg(all(unix, debug_assertions))]
mod sink;

#[cfg(all(unix, debug_assertions))]
pub use sink::{Syslog, SyslogWriter};

/// Environment variable holding the tracing filter directives
pub const LOG_ENV: &str = "ROOTDAEMON_LOG";

/// Filter used when `ROOTDAEMON_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "debug";

/// Install the diagnostic sink. Safe to call more than once.
pub fn init() {
    #[cfg(all(unix, debug_assertions))]
    init_syslog();
}

#[cfg(all(unix, debug_assertions))]
fn init_syslog() {
    use tracing_subscriber::EnvFilter;

    // No syslog daemon listening means no diagnostics, nothing more
    let Ok(sink) = Syslog::connect() else {
        return;
    };

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // syslogd stamps records itself
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(sink)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .try_init();
}
