// Process image replacement with a bounded retry loop

use super::policy::LaunchPolicy;
use crate::error::LaunchError;
use nix::errno::Errno;
use nix::libc;
use nix::unistd::execv;
use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::time::Duration;
use tracing::{debug, error};

/// Replaces the current process image
pub trait ImageReplacer {
    /// What a successful replacement yields. `Infallible` for a real exec.
    type Output;

    fn replace(&mut self, path: &CStr, argv: &[CString]) -> Result<Self::Output, Errno>;
}

/// `execv(3)`: keeps the pid and the inherited environment
#[derive(Debug, Default, Clone, Copy)]
pub struct Execv;

impl ImageReplacer for Execv {
    type Output = Infallible;

    fn replace(&mut self, path: &CStr, argv: &[CString]) -> Result<Infallible, Errno> {
        execv(path, argv)
    }
}

/// Waits between two attempts and reports how much of the delay was left
/// unslept
pub trait Pause {
    fn pause(&mut self, delay: Duration) -> Duration;
}

/// [`sleep_ms`] as a [`Pause`]
#[derive(Debug, Default, Clone, Copy)]
pub struct InterruptibleSleep;

impl Pause for InterruptibleSleep {
    fn pause(&mut self, delay: Duration) -> Duration {
        let ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Duration::from_millis(u64::from(sleep_ms(ms)))
    }
}

/// A successful replacement and the attempt it happened on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launched<T> {
    pub output: T,
    pub attempts: u32,
}

/// Try to replace the process image until it works or the policy runs out.
///
/// Pauses for `policy.retry_delay` between attempts, never after the last
/// one. An interrupted pause is not resumed; the next attempt just starts
/// early.
pub fn try_launch<R, P>(
    replacer: &mut R,
    pauser: &mut P,
    path: &CStr,
    argv: &[CString],
    policy: &LaunchPolicy,
) -> Result<Launched<R::Output>, LaunchError>
where
    R: ImageReplacer,
    P: Pause,
{
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let errno = match replacer.replace(path, argv) {
            Ok(output) => {
                return Ok(Launched {
                    output,
                    attempts: attempt,
                })
            }
            Err(errno) => errno,
        };

        if attempt >= max_attempts {
            return Err(LaunchError::Exhausted {
                path: path.to_string_lossy().into_owned(),
                attempts: attempt,
                last: errno.into(),
            });
        }

        debug!(
            attempt,
            max_attempts,
            path = %path.to_string_lossy(),
            "execv failed: {}, retrying",
            errno
        );

        let unslept = pauser.pause(policy.retry_delay);
        if !unslept.is_zero() {
            debug!(?unslept, "retry pause interrupted");
        }
    }
}

/// Replace this process with `path`, retrying per `policy`.
///
/// Never returns: either the target takes over the process or the process
/// exits with status 1 once every attempt has failed.
pub fn launch_with_retry(path: &CStr, argv: &[CString], policy: &LaunchPolicy) -> ! {
    match try_launch(&mut Execv, &mut InterruptibleSleep, path, argv, policy) {
        Ok(launched) => match launched.output {},
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Sleep for `ms` milliseconds.
///
/// Returns 0 once the full duration has elapsed. If a signal interrupts the
/// sleep, returns the unslept remainder rounded up, and at least 1, so an
/// interruption is never mistaken for completion.
pub fn sleep_ms(ms: u32) -> u32 {
    let request = libc::timespec {
        tv_sec: (ms / 1000) as libc::time_t,
        tv_nsec: ((ms % 1000) * 1_000_000) as _,
    };
    let mut remaining = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // SAFETY: both pointers reference live, properly initialized timespecs
    let rc = unsafe { libc::nanosleep(&request, &mut remaining) };
    if rc == 0 || Errno::last() != Errno::EINTR {
        return 0;
    }

    remaining_millis(remaining.tv_sec as i64, remaining.tv_nsec as i64)
}

fn remaining_millis(secs: i64, nanos: i64) -> u32 {
    let ms = secs
        .saturating_mul(1000)
        .saturating_add((nanos + 999_999) / 1_000_000);
    u32::try_from(ms).unwrap_or(u32::MAX).max(1)
}
