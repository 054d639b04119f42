use crate::config::BackendConfig;
use crate::error::{ConvertError, Result};
use crate::types::StepId;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// One generation request: the step it belongs to and the fully assembled
/// prompt.
#[derive(Debug, Clone)]
pub struct GenRequest {
    pub step: StepId,
    pub prompt: String,
}

/// The generation backend boundary. The orchestrator only ever sees this
/// trait; tests inject scripted or counting fakes.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, req: &GenRequest) -> Result<String>;
}

/// Build the production generator for a configured backend.
pub fn generator_for(backend: &BackendConfig) -> Box<dyn Generator> {
    match backend {
        BackendConfig::ClaudeCli {
            model,
            timeout_seconds,
            executable,
            max_turns,
        } => Box::new(ClaudeGenerator {
            model: model.clone(),
            timeout: Duration::from_secs(*timeout_seconds),
            executable: executable.clone(),
            max_turns: *max_turns,
        }),
        BackendConfig::Command {
            argv,
            timeout_seconds,
        } => Box::new(CommandGenerator {
            argv: argv.clone(),
            timeout: Duration::from_secs(*timeout_seconds),
        }),
    }
}

// ---------------------------------------------------------------------------
// ClaudeGenerator
// ---------------------------------------------------------------------------

/// Production backend: one `claude --print` subprocess per step via the
/// `claude-gen` crate.
pub struct ClaudeGenerator {
    model: String,
    timeout: Duration,
    executable: Option<String>,
    max_turns: Option<u32>,
}

#[async_trait]
impl Generator for ClaudeGenerator {
    async fn generate(&self, req: &GenRequest) -> Result<String> {
        let opts = claude_gen::GenOptions {
            model: Some(self.model.clone()),
            max_turns: self.max_turns,
            timeout: self.timeout,
            path_to_executable: self.executable.clone(),
            ..Default::default()
        };
        tracing::info!(step = %req.step, model = %self.model, "invoking claude backend");
        let result = claude_gen::generate(&req.prompt, &opts)
            .await
            .map_err(|e| ConvertError::Backend(e.to_string()))?;
        if result.is_error {
            return Err(ConvertError::Backend(format!(
                "generation ended with '{}' after {} turn(s)",
                result.subtype, result.num_turns
            )));
        }
        tracing::debug!(
            step = %req.step,
            cost_usd = result.total_cost_usd,
            duration_ms = result.duration_ms,
            "claude backend finished"
        );
        Ok(result.text)
    }
}

// ---------------------------------------------------------------------------
// CommandGenerator
// ---------------------------------------------------------------------------

/// Test-and-escape-hatch backend: run an arbitrary argv, write the prompt to
/// stdin, read the generation from stdout. The current step id is exported
/// as `FORMPORT_STEP` so a script can answer differently per step.
pub struct CommandGenerator {
    argv: Vec<String>,
    timeout: Duration,
}

#[async_trait]
impl Generator for CommandGenerator {
    async fn generate(&self, req: &GenRequest) -> Result<String> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(ConvertError::Backend(
                "command backend has an empty argv".to_string(),
            ));
        };

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .env("FORMPORT_STEP", req.step.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ConvertError::Backend(format!("failed to spawn '{program}': {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(req.prompt.as_bytes())
                .await
                .map_err(|e| ConvertError::Backend(format!("writing prompt to '{program}': {e}")))?;
            stdin
                .shutdown()
                .await
                .map_err(|e| ConvertError::Backend(format!("closing stdin of '{program}': {e}")))?;
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(done) => done
                .map_err(|e| ConvertError::Backend(format!("waiting for '{program}': {e}")))?,
            // kill_on_drop reaps the child when the future is dropped here
            Err(_) => {
                return Err(ConvertError::Backend(format!(
                    "command backend timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConvertError::Backend(format!(
                "'{program}' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
