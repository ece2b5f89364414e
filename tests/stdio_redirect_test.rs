// Integration tests for rebinding the standard streams to /dev/null
#![cfg(target_os = "linux")]

use nix::libc;
use nix::sys::stat::{fstat, stat};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, pipe, read, write, ForkResult};
use rootdaemon::daemon::detach::redirect_standard_streams;
use std::os::fd::AsRawFd;

#[test]
fn test_standard_streams_point_at_dev_null() {
    let devnull = stat("/dev/null").unwrap();

    // Keep a pipe on stdin so a read from the original descriptor would block
    let (stdin_read, stdin_write) = pipe().unwrap();
    let stdin_read_fd = stdin_read.as_raw_fd();

    match unsafe { fork() }.unwrap() {
        ForkResult::Child => {
            // Only async-signal-safe calls from here on
            unsafe { libc::dup2(stdin_read_fd, libc::STDIN_FILENO) };

            if redirect_standard_streams().is_err() {
                unsafe { libc::_exit(10) };
            }

            for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
                match fstat(fd) {
                    Ok(st) if st.st_rdev == devnull.st_rdev => {}
                    _ => unsafe { libc::_exit(11) },
                }
            }

            let mut buf = [0u8; 16];
            if read(libc::STDIN_FILENO, &mut buf) != Ok(0) {
                unsafe { libc::_exit(12) };
            }

            let stdout = unsafe { std::os::fd::BorrowedFd::borrow_raw(libc::STDOUT_FILENO) };
            if write(stdout, b"discarded\n") != Ok(10) {
                unsafe { libc::_exit(13) };
            }

            unsafe { libc::_exit(0) }
        }
        ForkResult::Parent { child } => {
            let status = waitpid(child, None).unwrap();
            drop(stdin_write);
            assert_eq!(status, WaitStatus::Exited(child, 0));
        }
    }
}
