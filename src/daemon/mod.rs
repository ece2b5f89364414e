// Daemon module - detach from the launcher, then become the target program

#[cfg(unix)]
pub mod detach;
#[cfg(unix)]
pub mod launch;
pub mod policy;

#[cfg(unix)]
pub use detach::{detach, Detached};
#[cfg(unix)]
pub use launch::{launch_with_retry, sleep_ms};
pub use policy::LaunchPolicy;

use crate::error::{DaemonizeError, Result};
use std::convert::Infallible;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Turns the calling process into a detached daemon running `target`
///
/// ```no_run
/// use rootdaemon::daemon::Daemonizer;
///
/// let never = Daemonizer::new("/system/bin/app_process")
///     .args(["/system/bin", "com.example.Main"])
///     .exec()?;
/// match never {}
/// # Ok::<(), rootdaemon::error::DaemonizeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Daemonizer {
    target: PathBuf,
    arg0: Option<OsString>,
    args: Vec<OsString>,
    policy: LaunchPolicy,
}

impl Daemonizer {
    pub fn new<P: Into<PathBuf>>(target: P) -> Self {
        Self {
            target: target.into(),
            arg0: None,
            args: Vec::new(),
            policy: LaunchPolicy::default(),
        }
    }

    /// Append one argument after argv[0]
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments after argv[0]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Override argv[0], which otherwise restates the target path
    pub fn arg0<S: Into<OsString>>(mut self, arg0: S) -> Self {
        self.arg0 = Some(arg0.into());
        self
    }

    pub fn policy(mut self, policy: LaunchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn launch_policy(&self) -> &LaunchPolicy {
        &self.policy
    }

    /// Full argument vector handed to the target, argv[0] included
    pub fn argv(&self) -> Vec<OsString> {
        let arg0 = self
            .arg0
            .clone()
            .unwrap_or_else(|| self.target.clone().into_os_string());

        std::iter::once(arg0).chain(self.args.iter().cloned()).collect()
    }

    /// Detach and replace the daemon with the target.
    ///
    /// The calling process exits with status 0 once the first child is gone.
    /// The daemon either becomes the target or exits with status 1 after the
    /// launch policy is exhausted. `Err` is only ever returned to the caller,
    /// when the request is invalid or the first fork fails.
    #[cfg(unix)]
    pub fn exec(self) -> Result<Infallible> {
        let (path, argv) = self.c_argv()?;

        match detach(false)? {
            Detached::Daemon => launch_with_retry(&path, &argv, &self.policy),
            Detached::Caller => std::process::exit(0),
        }
    }

    #[cfg(not(unix))]
    pub fn exec(self) -> Result<Infallible> {
        Err(DaemonizeError::Unsupported)
    }

    /// Convert path and argv up front so nothing forks for a request that
    /// could never launch
    #[cfg(unix)]
    fn c_argv(&self) -> Result<(std::ffi::CString, Vec<std::ffi::CString>)> {
        use std::ffi::{CString, OsStr};
        use std::os::unix::ffi::OsStrExt;

        fn to_c_string(value: &OsStr) -> Result<CString> {
            CString::new(value.as_bytes()).map_err(|_| {
                DaemonizeError::InvalidArgument(format!(
                    "{} contains a NUL byte",
                    value.to_string_lossy()
                ))
            })
        }

        let path = to_c_string(self.target.as_os_str())?;
        let argv = self
            .argv()
            .iter()
            .map(|arg| to_c_string(arg))
            .collect::<Result<Vec<_>>>()?;

        Ok((path, argv))
    }
}

/// Daemonize and exec `target_path` with `target_args` under the default
/// launch policy. argv[0] is the path itself.
pub fn daemonize_and_exec<P, I, S>(target_path: P, target_args: I) -> Result<Infallible>
where
    P: Into<PathBuf>,
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    Daemonizer::new(target_path).args(target_args).exec()
}
