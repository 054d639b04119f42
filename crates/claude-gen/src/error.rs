use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeGenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse generation output: {source}\n  output: {output}")]
    Parse {
        output: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    #[error("Claude executable not found: {0}")]
    ExecutableNotFound(String),
}
