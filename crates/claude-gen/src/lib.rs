//! `claude-gen`: one-shot Rust driver for the Claude CLI subprocess.
//!
//! This crate drives `claude --print --output-format json` for single
//! non-interactive generations, so the `formport` workspace can call Claude
//! without a Node.js runtime. Each call spawns a fresh subprocess, writes
//! the prompt to stdin, waits for the terminal JSON document, and enforces
//! a wall-clock timeout.
//!
//! # Architecture
//!
//! ```text
//! GenOptions
//!     │
//!     ▼
//! GenProcess    ← spawns `claude --print --output-format json …`
//!     │            prompt on stdin, stderr drained in background
//!     ▼
//! PrintResult   ← the single JSON document from stdout
//!     │
//!     ▼
//! GenResult     ← text, session id, cost, turn count
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_gen::{generate, GenOptions};
//!
//! let opts = GenOptions {
//!     model: Some("claude-sonnet-4-6".into()),
//!     ..Default::default()
//! };
//!
//! let result = generate("Summarise this form in one line.", &opts).await?;
//! println!("{}", result.text);
//! ```

pub mod error;
pub mod runner;
pub mod types;

pub(crate) mod process;

pub use error::ClaudeGenError;
pub use runner::generate;
pub use types::{GenOptions, GenResult, PrintResult, Usage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeGenError>;
