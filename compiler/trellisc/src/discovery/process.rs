//! Run a child process, capturing its output up to a fixed number of bytes per stream.
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;

use super::DiscoveryError;

#[derive(Debug)]
pub(super) struct Captured {
    pub(super) status: ExitStatus,
    pub(super) stdout: Vec<u8>,
    pub(super) stderr: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

enum Event {
    Finished(Stream, std::io::Result<Vec<u8>>),
    Overflow(Stream),
}

/// Spawn `command` and wait for it to exit.
///
/// `stdout` and `stderr` are drained on two helper threads. If either of them grows
/// past `limit` bytes the child is killed and [`DiscoveryError::OutputTooLarge`] is
/// returned without waiting for the helpers.
///
/// On Unix the child leads a new process group, and the whole group is killed: the
/// processes it spawned (e.g. the binary launched by `cargo run`) go down with it and
/// the helpers see their pipes close.
pub(super) fn run_bounded(mut command: Command, limit: usize) -> Result<Captured, DiscoveryError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command.spawn().map_err(DiscoveryError::Spawn)?;

    let (sender, receiver) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        drain(stdout, Stream::Stdout, limit, sender.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        drain(stderr, Stream::Stderr, limit, sender.clone());
    }
    drop(sender);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    // The loop ends when both helpers have hung up.
    for event in receiver {
        match event {
            Event::Overflow(stream) => {
                kill(&mut child);
                return Err(DiscoveryError::OutputTooLarge {
                    stream: stream.name(),
                    limit,
                });
            }
            Event::Finished(stream, output) => {
                let output = match output {
                    Ok(output) => output,
                    Err(e) => {
                        kill(&mut child);
                        return Err(DiscoveryError::Spawn(e));
                    }
                };
                match stream {
                    Stream::Stdout => stdout = output,
                    Stream::Stderr => stderr = output,
                }
            }
        }
    }
    let status = child.wait().map_err(DiscoveryError::Spawn)?;
    Ok(Captured {
        status,
        stdout,
        stderr,
    })
}

fn drain(
    source: impl Read + Send + 'static,
    stream: Stream,
    limit: usize,
    sender: mpsc::Sender<Event>,
) {
    std::thread::spawn(move || {
        let mut buffer = Vec::new();
        // One byte past the limit is enough to detect an overflow.
        let outcome = source
            .take(limit as u64 + 1)
            .read_to_end(&mut buffer)
            .map(|_| buffer);
        let event = match outcome {
            Ok(buffer) if buffer.len() > limit => Event::Overflow(stream),
            outcome => Event::Finished(stream, outcome),
        };
        // The receiver is gone if the other stream overflowed first.
        let _ = sender.send(event);
    });
}

#[cfg(unix)]
fn kill(child: &mut Child) {
    match libc::pid_t::try_from(child.id()) {
        Ok(pid) => {
            // SAFETY: `kill` has no memory-safety preconditions. A negative pid targets
            // the process group led by the child, which can't be reused before `wait`.
            if unsafe { libc::kill(-pid, libc::SIGKILL) } != 0 {
                let e = std::io::Error::last_os_error();
                tracing::warn!(error.msg = %e, "Failed to kill the discovery process group");
                let _ = child.kill();
            }
        }
        Err(_) => {
            let _ = child.kill();
        }
    }
    let _ = child.wait();
}

#[cfg(not(unix))]
fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!(error.msg = %e, "Failed to kill the discovery process");
    }
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn both_streams_are_captured() {
        let captured = run_bounded(sh("printf out; printf err >&2; exit 3"), 1024).unwrap();
        assert_eq!(captured.stdout, b"out");
        assert_eq!(captured.stderr, b"err");
        assert_eq!(captured.status.code(), Some(3));
    }

    #[test]
    fn oversized_output_is_rejected() {
        let error = run_bounded(sh("yes | head -c 4096"), 1024).unwrap_err();
        insta::assert_snapshot!(error, @"the discovery driver wrote more than 1024 bytes on stdout");
    }

    #[cfg(target_os = "linux")]
    fn is_running(pid: &str) -> bool {
        // Killed processes may linger as zombies until their new parent reaps them.
        match fs_err::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|state| !state.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn processes_spawned_by_the_child_are_killed_too() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let pid_file = pid_file.display();
        let script = format!(
            "sh -c 'echo $$ > {pid_file}; exec sleep 30' & \
             while [ ! -s {pid_file} ]; do :; done; \
             yes"
        );
        let error = run_bounded(sh(&script), 1024).unwrap_err();
        assert!(matches!(error, DiscoveryError::OutputTooLarge { .. }));

        let pid = fs_err::read_to_string(dir.path().join("pid")).unwrap();
        let pid = pid.trim();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while is_running(pid) {
            assert!(
                std::time::Instant::now() < deadline,
                "`sleep` ({pid}) survived its parent"
            );
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }

    #[test]
    fn output_at_the_limit_is_accepted() {
        let captured = run_bounded(sh("printf 0123456789"), 10).unwrap();
        assert_eq!(captured.stdout, b"0123456789");
    }
}
