use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Starts `binary` detached from the caller with stdout and stderr appended to a freshly
/// truncated `log_file`. Returns the child pid without waiting on it.
pub fn spawn(binary: &Path, args: &[OsString], log_file: &Path) -> Result<u32> {
    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::fs("creating", parent, e))?;
    }

    let stdout = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_file)
        .map_err(|e| Error::fs("opening log file", log_file, e))?;
    let stderr = stdout
        .try_clone()
        .map_err(|e| Error::fs("opening log file", log_file, e))?;

    tracing::debug!(binary = %binary.display(), args = ?args, "Spawning");

    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    // Keep Ctrl+C in the operator's terminal from reaching the node.
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| Error::Spawn {
        binary: binary.to_path_buf(),
        source: e,
    })?;

    let pid = child.id().ok_or_else(|| Error::Spawn {
        binary: binary.to_path_buf(),
        source: std::io::Error::other("child exited before its pid could be read"),
    })?;

    Ok(pid)
}

/// Whether a process with this pid exists (it may belong to another user).
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    let ret = unsafe { libc::kill(raw, 0) };
    let exists = ret == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
    exists && !is_zombie(pid)
}

/// An exited child nobody reaped yet still answers `kill(pid, 0)`.
#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{}/stat", pid)) else {
        return false;
    };
    // state follows the parenthesised command name, which may itself contain spaces
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .is_some_and(|state| state == "Z")
}

#[cfg(all(unix, not(target_os = "linux")))]
fn is_zombie(_pid: u32) -> bool {
    false
}

#[cfg(not(unix))]
pub fn is_alive(_pid: u32) -> bool {
    false
}

/// Sends SIGINT to `pid`, the graceful shutdown signal both clients honour.
///
/// On Linux the pid is first checked against `expected_binary` so a recycled pid belonging to an
/// unrelated program is never signalled.
#[cfg(unix)]
pub fn interrupt(pid: u32, expected_binary: Option<&Path>) -> Result<()> {
    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| Error::ProcessLookup {
            pid,
            reason: "not a valid process id".to_string(),
        })?;

    if !is_alive(pid) {
        return Err(Error::ProcessLookup {
            pid,
            reason: "process is not running".to_string(),
        });
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(expected) = expected_binary {
            verify_identity(pid, expected)?;
        }
    }
    #[cfg(not(target_os = "linux"))]
    let _ = expected_binary;

    let ret = unsafe { libc::kill(raw, libc::SIGINT) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Err(Error::ProcessLookup {
                pid,
                reason: err.to_string(),
            });
        }
        return Err(Error::Signal {
            pid,
            reason: err.to_string(),
        });
    }

    Ok(())
}

#[cfg(not(unix))]
pub fn interrupt(pid: u32, _expected_binary: Option<&Path>) -> Result<()> {
    Err(Error::Signal {
        pid,
        reason: "interrupt signals are only supported on unix".to_string(),
    })
}

#[cfg(target_os = "linux")]
fn verify_identity(pid: u32, expected: &Path) -> Result<()> {
    let proc_dir = Path::new("/proc").join(pid.to_string());
    let expected = fs::canonicalize(expected).unwrap_or_else(|_| expected.to_path_buf());

    // exe is unreadable for other users' processes; scripts show their interpreter there and
    // themselves in argv[1]
    let mut candidates = Vec::new();
    if let Ok(exe) = fs::read_link(proc_dir.join("exe")) {
        candidates.push(exe);
    }
    if let Ok(cmdline) = fs::read(proc_dir.join("cmdline")) {
        candidates.extend(
            cmdline
                .split(|b| *b == 0)
                .filter(|arg| !arg.is_empty())
                .take(2)
                .map(|arg| std::path::PathBuf::from(String::from_utf8_lossy(arg).into_owned())),
        );
    }
    if candidates.is_empty() {
        tracing::debug!(pid, "Cannot inspect process, skipping identity check");
        return Ok(());
    }

    let matches = candidates
        .iter()
        .any(|path| fs::canonicalize(path).map_or(false, |path| path == expected));
    if !matches {
        return Err(Error::ProcessLookup {
            pid,
            reason: format!(
                "pid now belongs to {} instead of {}",
                candidates[0].display(),
                expected.display()
            ),
        });
    }
    Ok(())
}

/// Runs `binary --version` and returns the first line it prints.
pub async fn probe_version(binary: &Path) -> Result<String> {
    let output = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::VersionProbe {
            binary: binary.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::VersionProbe {
            binary: binary.to_path_buf(),
            reason: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn wait_for(path: &Path, needle: &str) -> String {
        for _ in 0..100 {
            let content = fs::read_to_string(path).unwrap_or_default();
            if content.contains(needle) {
                return content;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        fs::read_to_string(path).unwrap_or_default()
    }

    #[tokio::test]
    async fn spawn_redirects_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "node", "echo out-$1\necho err >&2");
        let log = dir.path().join("logs/node.log");
        fs::create_dir_all(log.parent().unwrap()).unwrap();
        fs::write(&log, "stale content from last run\n").unwrap();

        let pid = spawn(&bin, &[OsString::from("x")], &log).unwrap();
        assert!(pid > 0);

        let content = wait_for(&log, "err").await;
        assert!(content.contains("out-x"));
        assert!(content.contains("err"));
        assert!(!content.contains("stale"));
    }

    #[tokio::test]
    async fn interrupt_stops_a_running_child() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "sleeper", "trap 'echo bye; exit 0' INT\nwhile true; do sleep 0.05; done");
        let log = dir.path().join("sleeper.log");

        let pid = spawn(&bin, &[], &log).unwrap();
        assert!(is_alive(pid));
        tokio::time::sleep(Duration::from_millis(100)).await;

        interrupt(pid, None).unwrap();
        assert!(wait_for(&log, "bye").await.contains("bye"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn interrupt_checks_the_binary_behind_the_pid() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "geth", "trap 'exit 0' INT\nwhile true; do sleep 0.05; done");
        let other = script(dir.path(), "other", "true");

        let pid = spawn(&bin, &[], &dir.path().join("geth.log")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(
            interrupt(pid, Some(&other)),
            Err(Error::ProcessLookup { .. })
        ));
        interrupt(pid, Some(&bin)).unwrap();
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn exited_children_are_not_alive() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "crasher", "exit 1");
        let pid = spawn(&bin, &[], &dir.path().join("crasher.log")).unwrap();

        let mut alive = true;
        for _ in 0..100 {
            alive = is_alive(pid);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!alive);
    }

    #[test]
    fn spawn_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let err = spawn(&dir.path().join("missing"), &[], &dir.path().join("log")).unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[test]
    fn dead_pids_are_lookup_errors() {
        // pid_max on linux is at most 2^22
        let pid = 4_194_304 + 17;
        assert!(!is_alive(pid));
        assert!(matches!(interrupt(pid, None), Err(Error::ProcessLookup { .. })));
    }

    #[tokio::test]
    async fn probe_version_returns_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "lighthouse", "echo\necho 'Lighthouse v1.2.3'\necho 'BLS library: blst'");
        assert_eq!(probe_version(&bin).await.unwrap(), "Lighthouse v1.2.3");

        let failing = script(dir.path(), "broken", "echo nope >&2\nexit 3");
        assert!(matches!(
            probe_version(&failing).await,
            Err(Error::VersionProbe { .. })
        ));
    }
}
