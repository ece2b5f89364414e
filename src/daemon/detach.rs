// Double-fork session detachment for Unix systems

use crate::error::{DaemonizeError, Result};
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup2, fork, setsid, ForkResult, Pid};
use std::process::exit;
use tracing::{debug, error};

const DEV_NULL: &str = "/dev/null";

/// Which side of the detach sequence resumed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// The original calling process, after its first child has exited
    Caller,
    /// The final grandchild, reparented to init and free of the caller's session
    Daemon,
}

/// Detach from the calling process's session and controlling terminal.
///
/// Forks once, waits for that first child to exit, and either exits
/// (`return_to_parent_caller == false`) or returns [`Detached::Caller`].
/// The first child rebinds stdio to `/dev/null`, starts a new session and
/// forks again without waiting; its own exit hands the grandchild over to
/// init. Only the grandchild sees [`Detached::Daemon`].
///
/// Failures after the first fork can't reach the caller: the first child
/// logs them and exits with status 1, which the caller observes as a
/// completed sequence. Only a failed first fork returns `Err`.
pub fn detach(return_to_parent_caller: bool) -> Result<Detached> {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = child.as_raw(), "waiting for first child to exit");
            let status = settle_wait(wait_for_exit(child));
            debug!(pid = child.as_raw(), ?status, "first child finished");
            if !return_to_parent_caller {
                exit(0);
            }
            Ok(Detached::Caller)
        }
        Ok(ForkResult::Child) => Ok(detach_first_child()),
        Err(e) => {
            error!("First fork failed: {}", e);
            Err(DaemonizeError::Fork(e.into()))
        }
    }
}

/// Runs in the first child. Only returns in the grandchild.
fn detach_first_child() -> Detached {
    if let Err(e) = redirect_standard_streams() {
        error!("{}", e);
        exit(1);
    }

    if let Err(e) = setsid() {
        error!("{}", DaemonizeError::Session(e.into()));
        exit(1);
    }

    // The grandchild must not be a session leader
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = child.as_raw(), "abandoning daemon to init");
            exit(0);
        }
        Ok(ForkResult::Child) => Detached::Daemon,
        Err(e) => {
            error!("Second fork failed: {}", e);
            exit(1);
        }
    }
}

/// Point stdin, stdout and stderr at `/dev/null`.
///
/// The three descriptors are closed first so nothing keeps a reference to
/// the launching terminal, even if reopening fails halfway.
pub fn redirect_standard_streams() -> Result<()> {
    let streams = [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO];

    for fd in streams {
        // EBADF just means the slot was already empty
        let _ = close(fd);
    }

    let devnull = open(DEV_NULL, OFlag::O_RDWR, Mode::empty())
        .map_err(|e| DaemonizeError::StandardStreams(e.into()))?;

    for fd in streams {
        if fd != devnull {
            dup2(devnull, fd).map_err(|e| DaemonizeError::StandardStreams(e.into()))?;
        }
    }

    // With all three slots closed the open usually lands on 0 itself
    if devnull > libc::STDERR_FILENO {
        close(devnull).map_err(|e| DaemonizeError::StandardStreams(e.into()))?;
    }

    Ok(())
}

/// The first child detaches whether or not the caller manages to wait on
/// it, so a failed wait is logged and counted as completion rather than
/// reported as a failed launch.
fn settle_wait(outcome: Result<Option<WaitStatus>>) -> Option<WaitStatus> {
    match outcome {
        Ok(status) => status,
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// Block until `pid` terminates.
///
/// Stop and continue notifications are requested explicitly and skipped, so a
/// debugger attaching or a stray SIGSTOP can't end the wait early. There is no
/// timeout. A child that was already reaped elsewhere (`ECHILD`) counts as
/// exited and yields `None`.
pub fn wait_for_exit(pid: Pid) -> Result<Option<WaitStatus>> {
    let flags = WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;

    loop {
        match waitpid(pid, Some(flags)) {
            Ok(status @ (WaitStatus::Exited(..) | WaitStatus::Signaled(..))) => {
                return Ok(Some(status))
            }
            Ok(status) => {
                debug!(pid = pid.as_raw(), ?status, "child changed state, still waiting");
            }
            Err(Errno::EINTR) => {}
            Err(Errno::ECHILD) => return Ok(None),
            Err(e) => {
                return Err(DaemonizeError::Wait {
                    pid: pid.as_raw(),
                    source: e.into(),
                })
            }
        }
    }
}
