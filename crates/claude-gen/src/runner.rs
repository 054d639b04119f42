use std::time::Duration;

use crate::process::GenProcess;
use crate::types::{GenOptions, GenResult, PrintResult};
use crate::{ClaudeGenError, Result};

// ─── Public API ───────────────────────────────────────────────────────────

/// Drive a single one-shot generation to completion.
///
/// Spawns the subprocess, enforces `opts.timeout` as a wall-clock limit,
/// parses the terminal JSON document and returns it as a [`GenResult`].
/// On timeout the subprocess is killed and [`ClaudeGenError::Timeout`] is
/// returned.
///
/// # Example
///
/// ```rust,ignore
/// use claude_gen::{generate, GenOptions};
///
/// let result = generate("Translate this form to a controller.", &GenOptions::default()).await?;
/// println!("{}", result.text);
/// ```
pub async fn generate(prompt: &str, opts: &GenOptions) -> Result<GenResult> {
    tracing::debug!(
        model = opts.model.as_deref().unwrap_or("default"),
        timeout_secs = opts.timeout.as_secs(),
        "spawning claude generation"
    );
    let process = GenProcess::spawn(prompt, opts).await?;
    run_with_timeout(process, opts.timeout).await
}

// ─── Internal ─────────────────────────────────────────────────────────────

/// Run a spawned process to completion under a wall-clock limit.
///
/// Split out from [`generate`] so tests can inject mock processes without
/// spawning a real Claude subprocess.
pub(crate) async fn run_with_timeout(
    mut process: GenProcess,
    timeout: Duration,
) -> Result<GenResult> {
    match tokio::time::timeout(timeout, finish(&mut process)).await {
        Ok(result) => result,
        Err(_) => {
            process.kill().await;
            Err(ClaudeGenError::Timeout(timeout.as_secs()))
        }
    }
}

/// Collect stdout, check the exit status, and parse the result document.
async fn finish(process: &mut GenProcess) -> Result<GenResult> {
    let stdout = process.read_stdout().await?;

    if let Some(exit_err) = process.wait_exit_error().await {
        return Err(exit_err);
    }

    let doc = parse_document(&stdout)?;
    tracing::debug!(
        subtype = %doc.subtype,
        num_turns = doc.num_turns,
        cost_usd = doc.total_cost_usd,
        "generation finished"
    );

    Ok(GenResult {
        text: doc.result.unwrap_or_default(),
        session_id: doc.session_id,
        subtype: doc.subtype,
        is_error: doc.is_error,
        total_cost_usd: doc.total_cost_usd,
        num_turns: doc.num_turns,
        duration_ms: doc.duration_ms,
    })
}

fn parse_document(stdout: &str) -> Result<PrintResult> {
    let trimmed = stdout.trim();
    serde_json::from_str::<PrintResult>(trimmed).map_err(|e| ClaudeGenError::Parse {
        output: preview(trimmed),
        source: e,
    })
}

/// First ~400 chars of the raw output, for error messages.
fn preview(s: &str) -> String {
    const LIMIT: usize = 400;
    if s.len() <= LIMIT {
        return s.to_string();
    }
    let mut end = LIMIT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

// ─── Tests ────────────────────────────────────────────────────────────────
