// End-to-end tests running the rootdaemon binary against a self-reporting shell
#![cfg(target_os = "linux")]

use nix::unistd::getsid;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_rootdaemon");

/// Records what the daemonized shell sees about itself into $1.
/// Descriptors are read before any redirection touches the shell's own
/// fds; the report goes to a temp name first so the reader never sees half
/// of it.
const SELF_REPORT: &str = r#"fd0=$(readlink /proc/$$/fd/0)
fd1=$(readlink /proc/$$/fd/1)
fd2=$(readlink /proc/$$/fd/2)
stat=$(cat /proc/$$/stat)
printf '%s\n' "$$" "$stat" "$fd0" "$fd1" "$fd2" "marker=$ROOTDAEMON_TEST_MARKER" > "$1.tmp"
mv "$1.tmp" "$1"
"#;

struct Report {
    pid: i32,
    ppid: i32,
    pgrp: i32,
    session: i32,
    tty_nr: i32,
    fds: Vec<String>,
    marker: String,
}

fn wait_for_report(path: &Path) -> Report {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !path.exists() {
        assert!(Instant::now() < deadline, "daemon never wrote {}", path.display());
        thread::sleep(Duration::from_millis(20));
    }

    let content = fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 6, "unexpected report: {:?}", lines);

    // Fields after "(comm)": state ppid pgrp session tty_nr
    let stat = &lines[1][lines[1].rfind(')').unwrap() + 1..];
    let fields: Vec<i32> = stat
        .split_whitespace()
        .skip(1)
        .take(4)
        .map(|f| f.parse().unwrap())
        .collect();

    Report {
        pid: lines[0].parse().unwrap(),
        ppid: fields[0],
        pgrp: fields[1],
        session: fields[2],
        tty_nr: fields[3],
        fds: lines[2..5].iter().map(|s| s.to_string()).collect(),
        marker: lines[5].trim_start_matches("marker=").to_string(),
    }
}

fn run_reporter(dir: &TempDir) -> (u32, Duration, Report) {
    let report_path: PathBuf = dir.path().join("report");

    let started = Instant::now();
    let mut launcher = Command::new(BIN)
        .env("ROOTDAEMON_TEST_MARKER", "inherited")
        .args(["/bin/sh", "-c", SELF_REPORT, "self-report"])
        .arg(&report_path)
        .spawn()
        .unwrap();
    let launcher_pid = launcher.id();
    let status = launcher.wait().unwrap();
    let elapsed = started.elapsed();

    assert!(status.success(), "launcher exited with {:?}", status);
    (launcher_pid, elapsed, wait_for_report(&report_path))
}

#[test]
fn test_target_runs_detached() {
    let dir = TempDir::new().unwrap();
    let (launcher_pid, elapsed, report) = run_reporter(&dir);

    // The launcher only waits for the short-lived first child
    assert!(elapsed < Duration::from_secs(5));

    // Not a child of the launcher, and not part of our session
    assert_ne!(report.ppid as u32, launcher_pid);
    assert_ne!(report.pid as u32, launcher_pid);
    assert_ne!(report.session, getsid(None).unwrap().as_raw());

    // The first child led the new session and is gone; the daemon never leads it
    assert_ne!(report.session, report.pid);
    assert_eq!(report.pgrp, report.session);
    assert!(!Path::new(&format!("/proc/{}", report.session)).exists());

    assert_eq!(report.tty_nr, 0, "daemon still has a controlling terminal");
}

#[test]
fn test_target_streams_and_environment() {
    let dir = TempDir::new().unwrap();
    let (_, _, report) = run_reporter(&dir);

    assert_eq!(report.fds, vec!["/dev/null"; 3]);
    assert_eq!(report.marker, "inherited");
}

#[test]
fn test_unlaunchable_target_still_detaches_cleanly() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing-binary");

    let started = Instant::now();
    let status = Command::new(BIN)
        .args(["--attempts", "2", "--retry-delay-ms", "1"])
        .arg(&missing)
        .status()
        .unwrap();

    // The failure happens in the daemon, after the launcher was released
    assert!(status.success());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_missing_target_argument_fails() {
    let output = Command::new(BIN).output().unwrap();
    assert!(!output.status.success());
}
