// Retry policy for the launch loop

use std::time::Duration;

/// Default number of replacement attempts (three have been needed in practice)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 16;

/// Default pause between two replacement attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(16);

/// Retry policy for replacing the daemon's process image
///
/// Early in boot `execv` can fail with `EACCES` for a short while, most likely
/// until the access-control subsystem has finished initializing. Every failure
/// is retried the same way until `max_attempts` is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchPolicy {
    /// Upper bound on replacement attempts
    pub max_attempts: u32,
    /// Fixed pause between consecutive attempts
    pub retry_delay: Duration,
}

impl LaunchPolicy {
    /// Create a policy with the default bound and delay
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Number of attempts actually made; there is always at least one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for LaunchPolicy {
    fn default() -> Self {
        Self::new()
    }
}
