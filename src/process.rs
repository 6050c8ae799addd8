//! Child-process execution with a wall-clock timeout.
//!
//! stdout and stderr are drained on their own threads so a chatty tool cannot
//! block on a full pipe while we poll for exit. A process that outlives its
//! timeout is killed together with everything it spawned and reported as
//! [`FinderError::ToolTimeout`].

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{FinderError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

pub fn run_with_timeout(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<ToolOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    // Own process group, so a timeout also reaches children of wrapper scripts
    // such as `mvnw` that still hold our pipes.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    log::debug!("running {} {}", program, args.join(" "));
    let mut child = cmd.spawn().map_err(|e| spawn_error(program, e))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("failed to capture stdout"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("failed to capture stderr"))?;

    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if start.elapsed() >= timeout => {
                log::warn!("{program} exceeded {}s, killing it", timeout.as_secs());
                terminate_process_tree(&mut child);
                // A descendant that escaped the group may still hold the pipes;
                // the reader threads are left to finish on their own.
                return Err(FinderError::ToolTimeout {
                    tool: program.to_string(),
                    timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                terminate_process_tree(&mut child);
                return Err(FinderError::Io(e));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(ToolOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
    })
}

fn terminate_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: plain syscall; a negative pid signals the group created by
            // `process_group(0)`, whose id equals the child's pid.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = Command::new("taskkill")
            .args(["/PID", &child.id().to_string(), "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_error(program: &str, err: io::Error) -> FinderError {
    if err.kind() == io::ErrorKind::NotFound {
        FinderError::ToolNotFound {
            tool: program.to_string(),
            hint: "install it or put it on PATH".to_string(),
        }
    } else {
        FinderError::ToolFailure {
            tool: program.to_string(),
            message: format!("failed to start: {err}"),
        }
    }
}
