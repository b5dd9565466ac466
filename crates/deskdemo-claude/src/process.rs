use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, Command},
    sync::mpsc,
    task::JoinHandle,
    time::{Duration, timeout},
};
use tracing::{debug, info, warn};

use crate::config::{Config, PermissionMode, ToolPreset};
use crate::error::{Error, Result};

/// Output lines buffered between the reader task and the consumer.
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Stderr kept for the error message of a failed run.
const STDERR_TAIL_BYTES: usize = 2048;

/// How long to keep reading stderr after the CLI exits. Anything it left
/// running may still hold the pipe open.
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// Build the CLI invocation for a streaming query.
///
/// The prompt itself is written to stdin, so it never shows up in process
/// listings and is not limited by argument length.
pub fn build_command(config: &Config, binary: &Path) -> Command {
    let mut cmd = Command::new(binary);

    cmd.arg("-p");
    cmd.arg("--output-format").arg("stream-json");
    // stream-json requires verbose flag
    cmd.arg("--verbose");

    if config.include_partial_messages {
        cmd.arg("--include-partial-messages");
    }

    if let Some(model) = &config.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(prompt) = &config.append_system_prompt {
        cmd.arg("--append-system-prompt").arg(prompt);
    }

    if let ToolPreset::Allowed(tools) = &config.tools {
        for tool in tools {
            cmd.arg("--allowedTools").arg(tool);
        }
        debug!("Added {} allowed tools", tools.len());
    }

    if config.permission_mode != PermissionMode::Default {
        cmd.arg("--permission-mode")
            .arg(config.permission_mode.as_flag());
    }

    if let Some(turns) = config.max_turns {
        cmd.arg("--max-turns").arg(turns.to_string());
    }

    if let Some(dir) = &config.working_dir {
        cmd.current_dir(dir);
    }

    cmd.envs(&config.env);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    // Own process group, so a kill reaches everything the CLI started.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

fn resolve_binary(config: &Config) -> Result<PathBuf> {
    match &config.binary {
        Some(path) => Ok(path.clone()),
        None => which::which("claude").map_err(|_| Error::BinaryNotFound),
    }
}

enum ReadOutcome {
    Eof,
    ReceiverDropped,
    TimedOut,
    ReadFailed(String),
}

/// Spawn the CLI and stream its stdout line by line.
///
/// The returned receiver yields every output line in order. A timeout,
/// read failure or non-zero exit is delivered as a final `Err` item. When
/// the receiver is dropped the process is killed.
pub async fn spawn_streaming(
    config: &Config,
    prompt: &str,
) -> Result<mpsc::Receiver<Result<String>>> {
    let binary = resolve_binary(config)?;
    let mut cmd = build_command(config, &binary);

    debug!("Executing Claude command for streaming: {:?}", cmd);

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::ProcessError(format!("Failed to spawn process: {e}")))?;

    // Write the prompt before returning so write errors reach the caller.
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| Error::ProcessError(format!("Failed to write to stdin: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::ProcessError(format!("Failed to flush stdin: {e}")))?;
        // Close stdin to signal EOF to the child.
        drop(stdin);
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::ProcessError("stdout was not captured".to_string()))?;
    let stderr_task = child.stderr.take().map(|stderr| tokio::spawn(drain_stderr(stderr)));

    let (tx, rx) = mpsc::channel::<Result<String>>(LINE_CHANNEL_CAPACITY);
    let timeout_secs = config.timeout_secs;
    let timeout_duration = Duration::from_secs(timeout_secs);

    info!(prompt_len = prompt.len(), "claude agent process started");

    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();

        let outcome = loop {
            match timeout(timeout_duration, lines.next_line()).await {
                Ok(Ok(Some(line))) => {
                    if tx.send(Ok(line)).await.is_err() {
                        break ReadOutcome::ReceiverDropped;
                    }
                }
                Ok(Ok(None)) => break ReadOutcome::Eof,
                Ok(Err(e)) => break ReadOutcome::ReadFailed(e.to_string()),
                Err(_) => break ReadOutcome::TimedOut,
            }
        };

        match outcome {
            ReadOutcome::Eof => {
                let status = child.wait().await;
                let stderr_tail = collect_stderr(stderr_task).await;
                match status {
                    Ok(status) if !status.success() => {
                        let exit_code = status.code().unwrap_or(-1);
                        let _ = tx
                            .send(Err(Error::ProcessError(format!(
                                "Claude command failed with exit code {exit_code}: {}",
                                stderr_tail.trim()
                            ))))
                            .await;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::ProcessError(format!("Process error: {e}"))))
                            .await;
                    }
                    Ok(_) => {
                        debug!("Claude process completed successfully");
                    }
                }
            }
            ReadOutcome::ReceiverDropped => {
                terminate(&mut child, stderr_task).await;
                debug!("Receiver dropped, claude process killed");
            }
            ReadOutcome::TimedOut => {
                warn!(timeout_secs, "claude produced no output in time, killing it");
                let _ = tx.send(Err(Error::Timeout(timeout_secs))).await;
                drop(tx);
                terminate(&mut child, stderr_task).await;
            }
            ReadOutcome::ReadFailed(e) => {
                let _ = tx
                    .send(Err(Error::ProcessError(format!("Failed to read line: {e}"))))
                    .await;
                drop(tx);
                terminate(&mut child, stderr_task).await;
            }
        }
    });

    Ok(rx)
}

/// Kill the CLI together with its process group and reap it.
async fn terminate(child: &mut Child, stderr_task: Option<JoinHandle<String>>) {
    kill_process_group(child);
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill claude process");
    }
    if let Some(task) = stderr_task {
        task.abort();
    }
}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created at spawn.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!(
            error = %std::io::Error::last_os_error(),
            "failed to kill claude process group"
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) {}

/// Wait briefly for the stderr drain to finish.
async fn collect_stderr(stderr_task: Option<JoinHandle<String>>) -> String {
    let Some(mut task) = stderr_task else {
        return String::new();
    };
    match timeout(STDERR_GRACE, &mut task).await {
        Ok(tail) => tail.unwrap_or_default(),
        Err(_) => {
            debug!("stderr still open after exit, giving up on it");
            task.abort();
            String::new()
        }
    }
}

/// Read stderr to completion, logging it and keeping the tail.
async fn drain_stderr(stderr: ChildStderr) -> String {
    let mut lines = BufReader::new(stderr).lines();
    let mut tail = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!("Claude CLI stderr: {}", line);
        tail.push_str(&line);
        tail.push('\n');
        if tail.len() > STDERR_TAIL_BYTES {
            let mut cut = tail.len() - STDERR_TAIL_BYTES;
            while !tail.is_char_boundary(cut) {
                cut += 1;
            }
            tail.drain(..cut);
        }
    }

    tail
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_relay_style_command_line() {
        let config = Config::builder()
            .model("claude-sonnet-4-5")
            .permission_mode(PermissionMode::BypassPermissions)
            .max_turns(10)
            .build()
            .unwrap();

        let cmd = build_command(&config, Path::new("/usr/bin/claude"));
        assert_eq!(
            args(&cmd),
            vec![
                "-p",
                "--output-format",
                "stream-json",
                "--verbose",
                "--include-partial-messages",
                "--model",
                "claude-sonnet-4-5",
                "--permission-mode",
                "bypassPermissions",
                "--max-turns",
                "10",
            ]
        );
    }

    #[test]
    fn test_allowed_tools_and_defaults() {
        let config = Config::builder()
            .tools(ToolPreset::Allowed(vec!["Read".into(), "WebSearch".into()]))
            .include_partial_messages(false)
            .build()
            .unwrap();

        let cmd = build_command(&config, Path::new("claude"));
        let args = args(&cmd);
        assert!(!args.contains(&"--include-partial-messages".to_string()));
        assert!(!args.contains(&"--permission-mode".to_string()));
        assert!(!args.contains(&"--max-turns".to_string()));
        assert_eq!(
            args.iter().filter(|a| *a == "--allowedTools").count(),
            2
        );
    }

    #[cfg(unix)]
    mod fake_cli {
        use super::*;
        use pretty_assertions::assert_eq;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("claude");
            std::fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        async fn collect(mut rx: mpsc::Receiver<Result<String>>) -> Vec<Result<String>> {
            let mut items = Vec::new();
            while let Some(item) = rx.recv().await {
                items.push(item);
            }
            items
        }

        #[tokio::test]
        async fn test_streams_lines_in_order() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(&dir, "echo one\necho two");
            let config = Config::builder().binary(bin).build().unwrap();

            let rx = spawn_streaming(&config, "hello").await.unwrap();
            let lines: Vec<String> = collect(rx).await.into_iter().map(|r| r.unwrap()).collect();
            assert_eq!(lines, vec!["one", "two"]);
        }

        #[tokio::test]
        async fn test_non_zero_exit_reported_last() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(&dir, "echo partial\necho 'auth failed' >&2\nexit 3");
            let config = Config::builder().binary(bin).build().unwrap();

            let items = collect(spawn_streaming(&config, "hello").await.unwrap()).await;
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].as_deref().unwrap(), "partial");
            match &items[1] {
                Err(Error::ProcessError(msg)) => {
                    assert!(msg.contains("exit code 3"), "{msg}");
                    assert!(msg.contains("auth failed"), "{msg}");
                }
                other => panic!("expected process error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_silent_process_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(&dir, "exec sleep 10");
            let config = Config::builder().binary(bin).timeout_secs(1).build().unwrap();

            let items = collect(spawn_streaming(&config, "hello").await.unwrap()).await;
            assert!(matches!(items.as_slice(), [Err(Error::Timeout(1))]));
        }

        #[tokio::test]
        async fn test_timeout_not_delayed_by_lingering_child() {
            let dir = tempfile::tempdir().unwrap();
            // No exec: the sleep is a grandchild holding stdout and stderr.
            let bin = script(&dir, "sleep 8");
            let config = Config::builder().binary(bin).timeout_secs(1).build().unwrap();

            let started = Instant::now();
            let mut rx = spawn_streaming(&config, "hello").await.unwrap();
            let first = rx.recv().await;
            assert!(matches!(first, Some(Err(Error::Timeout(1)))), "{first:?}");
            assert!(rx.recv().await.is_none());
            assert!(
                started.elapsed() < Duration::from_secs(4),
                "timeout arrived after {:?}",
                started.elapsed()
            );
        }

        #[tokio::test]
        async fn test_exit_reported_while_child_holds_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let bin = script(&dir, "sleep 8 > /dev/null &\necho 'bad flag' >&2\nexit 2");
            let config = Config::builder().binary(bin).timeout_secs(30).build().unwrap();

            let started = Instant::now();
            let items = collect(spawn_streaming(&config, "hello").await.unwrap()).await;
            assert!(started.elapsed() < Duration::from_secs(5));
            match items.as_slice() {
                [Err(Error::ProcessError(msg))] => assert!(msg.contains("exit code 2"), "{msg}"),
                other => panic!("expected process error, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_missing_binary() {
            let config = Config::builder()
                .binary("/nonexistent/claude")
                .build()
                .unwrap();
            let result = spawn_streaming(&config, "hello").await;
            assert!(matches!(result, Err(Error::ProcessError(_))));
        }
    }
}
