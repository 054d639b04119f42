use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::types::GenOptions;
use crate::{ClaudeGenError, Result};

// ─── GenProcess ───────────────────────────────────────────────────────────

/// A running `claude --print --output-format json` subprocess.
///
/// The prompt is written to stdin and stdin is closed; the CLI runs to
/// completion and prints one JSON document on stdout. Stderr is captured in
/// a background task and surfaced on process exit errors.
pub(crate) struct GenProcess {
    child: Child,
    stdout: Option<ChildStdout>,
    /// Stderr output collected by a background reader task.
    stderr_buf: Arc<Mutex<String>>,
}

impl GenProcess {
    /// Spawn the real `claude` binary with the given prompt and options.
    ///
    /// `CLAUDECODE` is removed from the environment so this works both from a
    /// terminal and from inside a running Claude session.
    pub(crate) async fn spawn(prompt: &str, opts: &GenOptions) -> Result<Self> {
        let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
        let mut cmd = build_command(opts);
        cmd.env_remove("CLAUDECODE");

        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        Self::from_command(cmd, exe, prompt).await
    }

    /// Spawn an arbitrary command as a mock Claude process.
    /// Used in unit tests to inject a command that emits fixed output.
    #[cfg(test)]
    pub(crate) async fn spawn_command(cmd: Command, prompt: &str) -> Result<Self> {
        Self::from_command(cmd, "mock", prompt).await
    }

    async fn from_command(mut cmd: Command, exe: &str, prompt: &str) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClaudeGenError::ExecutableNotFound(exe.to_string())
            } else {
                ClaudeGenError::Io(e)
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeGenError::Process("stdout not captured".into()))?;

        // Spawn a background task to drain stderr into a buffer so the child
        // never blocks on a full stderr pipe.
        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        // Write the prompt, then close stdin so the CLI starts its single turn.
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(ClaudeGenError::Io)?;
            stdin.shutdown().await.map_err(ClaudeGenError::Io)?;
        }

        Ok(Self {
            child,
            stdout: Some(stdout),
            stderr_buf,
        })
    }

    /// Read the subprocess stdout to EOF.
    ///
    /// Print mode emits exactly one JSON document, so there is nothing to
    /// stream; we collect the whole output and parse it once.
    pub(crate) async fn read_stdout(&mut self) -> Result<String> {
        let mut stdout = self
            .stdout
            .take()
            .ok_or_else(|| ClaudeGenError::Process("stdout already consumed".into()))?;

        let mut out = String::new();
        stdout
            .read_to_string(&mut out)
            .await
            .map_err(ClaudeGenError::Io)?;
        Ok(out)
    }

    /// Wait for the child to exit and return an error if the exit code is
    /// non-zero or the process was killed by a signal. Captured stderr is
    /// included in the error message.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<ClaudeGenError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(ClaudeGenError::Io(e)),
        };

        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .ok()
            .map(|b| b.clone())
            .unwrap_or_default();

        let msg = if let Some(code) = status.code() {
            if stderr.is_empty() {
                format!("Claude process exited with code {code}")
            } else {
                format!("Claude process exited with code {code}\nstderr: {stderr}")
            }
        } else {
            // Killed by signal (Unix)
            if stderr.is_empty() {
                "Claude process terminated by signal".to_string()
            } else {
                format!("Claude process terminated by signal\nstderr: {stderr}")
            }
        };

        Some(ClaudeGenError::Process(msg))
    }

    /// Kill the subprocess (best-effort; errors are silently ignored).
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(opts: &GenOptions) -> Command {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    let mut cmd = Command::new(exe);

    // One-shot print mode: run to completion, emit a single JSON document
    cmd.arg("--print").arg("--output-format").arg("json");

    if let Some(model) = &opts.model {
        cmd.arg("--model").arg(model);
    }

    if let Some(max_turns) = opts.max_turns {
        cmd.arg("--max-turns").arg(max_turns.to_string());
    }

    if let Some(sp) = &opts.system_prompt {
        cmd.arg("--system-prompt").arg(sp);
    }

    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }

    // NOTE: prompt is NOT a positional arg; it's sent via stdin

    cmd
}

// ─── Tests ────────────────────────────────────────────────────────────────
