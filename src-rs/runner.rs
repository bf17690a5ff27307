use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use wait_timeout::ChildExt;

use crate::command::CommandLine;
use crate::error::{DispatchError, ToolFailure};

#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub returncode: i32,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

pub trait RunTool {
    fn run(&self, command: &CommandLine) -> Result<ToolOutcome, DispatchError>;
}

/// Runs the command as a child process and blocks until it exits.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl RunTool for ProcessRunner {
    fn run(&self, command: &CommandLine) -> Result<ToolOutcome, DispatchError> {
        let program = command.program().to_string();
        tracing::info!(command = %command, "Running");

        let mut cmd = Command::new(&program);
        cmd.args(command.args());
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| ToolFailure::Launch {
            program: program.clone(),
            source,
        })?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => match child.wait_timeout(timeout) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolFailure::Timeout {
                        program,
                        secs: timeout.as_secs(),
                    }
                    .into());
                }
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolFailure::Launch { program, source }.into());
                }
            },
            None => child.wait().map_err(|source| ToolFailure::Launch {
                program: program.clone(),
                source,
            })?,
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        check_status(&program, status, &stderr)?;

        Ok(ToolOutcome {
            returncode: status.code().unwrap_or(0),
            stdout_tail: truncate_text(&stdout, 2400),
            stderr_tail: truncate_text(&stderr, 2400),
        })
    }
}

/// Reads a child pipe to end on its own thread.
fn spawn_reader<R>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut raw = Vec::new();
            let _ = pipe.read_to_end(&mut raw);
            raw
        })
    })
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> String {
    let raw = reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();
    String::from_utf8_lossy(&raw).trim().to_string()
}

fn check_status(program: &str, status: ExitStatus, stderr: &str) -> Result<(), ToolFailure> {
    if status.success() {
        return Ok(());
    }
    tracing::warn!(program, code = ?status.code(), "external tool failed");
    Err(ToolFailure::Exit {
        program: program.to_string(),
        code: status.code(),
        stderr: truncate_text(stderr, 2400),
    })
}

fn truncate_text(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    text.chars().take(limit).collect::<String>() + "\n...<truncated>..."
}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::command::{BuildCommand, Direction, JpegpixiCommand, Method, PixelizationRequest};
    use crate::rect::Rectangle;
    use tempfile::tempdir;

    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-jpegpixi");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn command_for(tool: &Path, source: &Path, target: &Path) -> CommandLine {
        JpegpixiCommand::new(tool.display().to_string()).build(
            source,
            target,
            &Rectangle::new(0, 0, 8, 8).unwrap(),
            &PixelizationRequest {
                method: Method::Average,
                direction: Direction::TwoD,
            },
        )
    }

    #[test]
    fn successful_run_receives_discrete_arguments() {
        let dir = tempdir().unwrap();
        let tool = fake_tool(dir.path(), r#"printf '%s\n' "$@" > "$(dirname "$0")/args.txt""#);
        let source = dir.path().join("a b.jpg");
        let target = dir.path().join("a b-pixi.jpg");

        let outcome = ProcessRunner::default()
            .run(&command_for(&tool, &source, &target))
            .unwrap();
        assert_eq!(outcome.returncode, 0);

        let args = fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let lines: Vec<&str> = args.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "-m");
        assert_eq!(lines[1], "average");
        assert_eq!(lines[2], source.display().to_string());
        assert_eq!(lines[4], "2d:0,0,8,8");
    }

    #[test]
    fn non_zero_exit_is_reported_with_stderr() {
        let dir = tempdir().unwrap();
        let tool = fake_tool(dir.path(), "echo 'bad block spec' >&2\nexit 3");
        let err = ProcessRunner::default()
            .run(&command_for(&tool, Path::new("a.jpg"), Path::new("b.jpg")))
            .unwrap_err();
        match err {
            DispatchError::ExternalTool(ToolFailure::Exit { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "bad block spec");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_a_launch_failure() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-tool");
        let err = ProcessRunner::default()
            .run(&command_for(&missing, Path::new("a.jpg"), Path::new("b.jpg")))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ExternalTool(ToolFailure::Launch { .. })
        ));
    }

    #[test]
    fn slow_tool_times_out() {
        let dir = tempdir().unwrap();
        let tool = fake_tool(dir.path(), "sleep 5");
        let err = ProcessRunner::new(Some(Duration::from_millis(200)))
            .run(&command_for(&tool, Path::new("a.jpg"), Path::new("b.jpg")))
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ExternalTool(ToolFailure::Timeout { .. })
        ));
    }

    #[test]
    fn chatty_tool_finishes_within_timeout() {
        let dir = tempdir().unwrap();
        let tool = fake_tool(
            dir.path(),
            "head -c 200000 /dev/zero | tr '\\0' 'x' >&2\nhead -c 200000 /dev/zero | tr '\\0' 'y'\nexit 0",
        );
        let outcome = ProcessRunner::new(Some(Duration::from_secs(20)))
            .run(&command_for(&tool, Path::new("a.jpg"), Path::new("b.jpg")))
            .unwrap();
        assert_eq!(outcome.returncode, 0);
        assert!(outcome.stderr_tail.starts_with("xxxx"));
        assert!(outcome.stdout_tail.ends_with("...<truncated>..."));
    }

    #[test]
    fn truncates_long_output() {
        let long = "x".repeat(3000);
        let cut = truncate_text(&long, 2400);
        assert!(cut.ends_with("...<truncated>..."));
        assert_eq!(truncate_text("short", 2400), "short");
    }
}
