// CLI module - command-line surface of the rootdaemon binary

use crate::daemon::policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::daemon::{Daemonizer, LaunchPolicy};
use crate::logs;
use anyhow::Context;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Detach from the terminal and replace the daemon with TARGET
#[derive(Parser, Debug)]
#[command(name = "rootdaemon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Maximum number of exec attempts
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..))]
    attempts: u32,

    /// Pause between exec attempts, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RETRY_DELAY.as_millis() as u64)]
    retry_delay_ms: u64,

    /// Executable to run, followed by its arguments (argv[0] is TARGET)
    #[arg(
        value_name = "TARGET",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

impl Cli {
    /// Parse the command line, install the diagnostic sink and daemonize
    pub fn run() -> anyhow::Result<()> {
        let cli = Cli::parse();
        logs::init();
        cli.execute()
    }

    pub fn target(&self) -> PathBuf {
        self.command
            .first()
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    pub fn policy(&self) -> LaunchPolicy {
        LaunchPolicy::new()
            .max_attempts(self.attempts)
            .retry_delay(Duration::from_millis(self.retry_delay_ms))
    }

    pub fn daemonizer(&self) -> Daemonizer {
        Daemonizer::new(self.target())
            .args(self.command.iter().skip(1))
            .policy(self.policy())
    }

    fn execute(self) -> anyhow::Result<()> {
        let target = self.target();
        let never = self
            .daemonizer()
            .exec()
            .with_context(|| format!("Failed to daemonize {}", target.display()))?;
        match never {}
    }
}
