use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

// ─── GenOptions ───────────────────────────────────────────────────────────

/// Options for a single one-shot Claude generation.
///
/// Every generation is a fresh subprocess invocation of
/// `claude --print --output-format json` with the prompt on stdin.
#[derive(Debug, Clone)]
pub struct GenOptions {
    /// Claude model name (e.g. `"claude-sonnet-4-6"`)
    pub model: Option<String>,
    /// Maximum number of agentic turns before the CLI stops with `error_max_turns`
    pub max_turns: Option<u32>,
    /// Override system prompt
    pub system_prompt: Option<String>,
    /// Wall-clock limit for the whole generation; the subprocess is killed
    /// when it expires
    pub timeout: Duration,
    /// Working directory for the subprocess (default: current dir)
    pub cwd: Option<PathBuf>,
    /// Additional environment variables for the subprocess
    pub env: HashMap<String, String>,
    /// Custom path to the `claude` binary (default: `"claude"`)
    pub path_to_executable: Option<String>,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_turns: None,
            system_prompt: None,
            timeout: Duration::from_secs(600),
            cwd: None,
            env: HashMap::new(),
            path_to_executable: None,
        }
    }
}

// ─── Wire format ──────────────────────────────────────────────────────────

/// The single JSON document emitted by `claude --print --output-format json`.
///
/// Unlike the streaming protocol this is one self-contained object printed
/// after the run completes. Error subtypes (`error_max_turns`,
/// `error_during_execution`, …) set `is_error` and omit `result`.
#[derive(Debug, Clone, Deserialize)]
pub struct PrintResult {
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    /// Final assistant text; absent for error subtypes
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub total_cost_usd: f64,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

// ─── GenResult ────────────────────────────────────────────────────────────

/// The outcome of a completed generation.
#[derive(Debug, Clone)]
pub struct GenResult {
    /// The final text Claude produced (empty string for error subtypes).
    pub text: String,
    pub session_id: String,
    /// Terminal subtype reported by the CLI (`"success"`, `"error_max_turns"`, …).
    pub subtype: String,
    /// `true` if the run ended with any error subtype.
    pub is_error: bool,
    pub total_cost_usd: f64,
    pub num_turns: u32,
    pub duration_ms: u64,
}
