//! Runs operator-configured programs and captures their combined output.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time;
use tracing::{debug, warn};

const READ_BUF_SIZE: usize = 8 * 1024;

/// Why a command produced no usable result. Every variant except `Spawn`
/// keeps the output read before the failure.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start `{program}`: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("`{program}` failed: {status}")]
    Exit {
        program: String,
        status: ExitStatus,
        output: String,
    },
    #[error("`{program}` timed out after {}s", .timeout.as_secs())]
    TimedOut {
        program: String,
        timeout: Duration,
        output: String,
    },
    #[error("failed to collect output of `{program}`: {source}")]
    Io {
        program: String,
        source: io::Error,
        output: String,
    },
}

impl CommandError {
    /// Output captured before the failure, empty if the program never ran.
    pub fn into_output(self) -> String {
        match self {
            CommandError::Spawn { .. } => String::new(),
            CommandError::Exit { output, .. }
            | CommandError::TimedOut { output, .. }
            | CommandError::Io { output, .. } => output,
        }
    }
}

#[derive(Debug)]
pub struct CommandRunner {
    timeout: Option<Duration>,
}

impl CommandRunner {
    /// `None` lets commands run until they exit.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Runs `program` without a shell or arguments and returns stdout and
    /// stderr interleaved in arrival order.
    ///
    /// The child is killed when the deadline passes or when the returned
    /// future is dropped.
    pub async fn run(&self, program: &str) -> Result<String, CommandError> {
        let started = Instant::now();
        let mut child = Command::new(program)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: program.to_string(),
                source,
            })?;
        debug!(program, pid = child.id(), "command started");

        let mut combined = Vec::new();
        let result = match self.timeout {
            Some(limit) => time::timeout(limit, execute(&mut child, &mut combined)).await,
            None => Ok(execute(&mut child, &mut combined).await),
        };
        let output = String::from_utf8_lossy(&combined).into_owned();

        let status = match result {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                return Err(CommandError::Io {
                    program: program.to_string(),
                    source,
                    output,
                });
            }
            Err(_) => {
                if let Err(err) = child.kill().await {
                    warn!(program, error = %err, "failed to kill timed out command");
                }
                return Err(CommandError::TimedOut {
                    program: program.to_string(),
                    timeout: self.timeout.unwrap_or_default(),
                    output,
                });
            }
        };

        debug!(
            program,
            %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            bytes = combined.len(),
            "command finished"
        );
        if !status.success() {
            return Err(CommandError::Exit {
                program: program.to_string(),
                status,
                output,
            });
        }
        Ok(output)
    }
}

async fn execute(child: &mut Child, combined: &mut Vec<u8>) -> io::Result<ExitStatus> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    drain_combined(stdout, stderr, combined).await?;
    child.wait().await
}

/// Reads both pipes until EOF, appending chunks in the order they arrive.
async fn drain_combined<O, E>(
    stdout: Option<O>,
    stderr: Option<E>,
    combined: &mut Vec<u8>,
) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_open = stdout.is_some();
    let mut err_open = stderr.is_some();
    let (mut stdout, mut stderr) = (stdout, stderr);
    let mut out_buf = [0u8; READ_BUF_SIZE];
    let mut err_buf = [0u8; READ_BUF_SIZE];

    while out_open || err_open {
        tokio::select! {
            read = read_some(&mut stdout, &mut out_buf), if out_open => {
                match read? {
                    0 => out_open = false,
                    n => combined.extend_from_slice(&out_buf[..n]),
                }
            }
            read = read_some(&mut stderr, &mut err_buf), if err_open => {
                match read? {
                    0 => err_open = false,
                    n => combined.extend_from_slice(&err_buf[..n]),
                }
            }
        }
    }
    Ok(())
}

async fn read_some<R: AsyncRead + Unpin>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => Ok(0),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::{TempDir, tempdir};

    fn script(body: &str) -> (TempDir, PathBuf) {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("job.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        (temp, path)
    }

    #[tokio::test]
    async fn success_returns_stdout_and_stderr() {
        let (_temp, path) = script("echo out\necho err 1>&2");
        let runner = CommandRunner::new(None);
        let output = runner.run(path.to_str().unwrap()).await.expect("run");
        assert!(output.contains("out\n"));
        assert!(output.contains("err\n"));
    }

    #[tokio::test]
    async fn nonzero_exit_keeps_partial_output() {
        let (_temp, path) = script("echo step one\nexit 3");
        let runner = CommandRunner::new(Some(Duration::from_secs(30)));
        let err = runner.run(path.to_str().unwrap()).await.unwrap_err();

        assert!(matches!(err, CommandError::Exit { ref status, .. } if status.code() == Some(3)));
        assert_eq!(err.into_output(), "step one\n");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let runner = CommandRunner::new(None);
        let err = runner.run("/nonexistent/upt-command").await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
        assert!(err.into_output().is_empty());
    }

    #[tokio::test]
    async fn slow_program_is_killed_at_the_deadline() {
        let (_temp, path) = script("echo started\nexec sleep 30");
        let runner = CommandRunner::new(Some(Duration::from_millis(500)));
        let started = Instant::now();
        let err = runner.run(path.to_str().unwrap()).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert_eq!(err.into_output(), "started\n");
    }
}
