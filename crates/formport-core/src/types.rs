use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StepId
// ---------------------------------------------------------------------------

/// The six pipeline steps, in canonical execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    AnalyzeForm,
    AnalyzeData,
    GenerateModel,
    GenerateController,
    GenerateViews,
    WriteSummary,
}

impl StepId {
    pub fn all() -> &'static [StepId] {
        &[
            StepId::AnalyzeForm,
            StepId::AnalyzeData,
            StepId::GenerateModel,
            StepId::GenerateController,
            StepId::GenerateViews,
            StepId::WriteSummary,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepId::AnalyzeForm => "analyze_form",
            StepId::AnalyzeData => "analyze_data",
            StepId::GenerateModel => "generate_model",
            StepId::GenerateController => "generate_controller",
            StepId::GenerateViews => "generate_views",
            StepId::WriteSummary => "write_summary",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepId {
    type Err = crate::error::ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyze_form" | "analyze-form" => Ok(StepId::AnalyzeForm),
            "analyze_data" | "analyze-data" => Ok(StepId::AnalyzeData),
            "generate_model" | "generate-model" => Ok(StepId::GenerateModel),
            "generate_controller" | "generate-controller" => Ok(StepId::GenerateController),
            "generate_views" | "generate-views" => Ok(StepId::GenerateViews),
            "write_summary" | "write-summary" => Ok(StepId::WriteSummary),
            _ => Err(crate::error::ConvertError::UnknownStep(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// StepState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn as_str(self) -> &'static str {
        match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepErrorKind
// ---------------------------------------------------------------------------

/// Why a step failed. Recorded in the manifest so a later `--resume` or
/// `--rerun-failed` pass can report and retry meaningfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    MissingDependency,
    BackendFailure,
    MalformedOutput,
    WriteFailed,
    Cancelled,
}

impl StepErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepErrorKind::MissingDependency => "missing_dependency",
            StepErrorKind::BackendFailure => "backend_failure",
            StepErrorKind::MalformedOutput => "malformed_output",
            StepErrorKind::WriteFailed => "write_failed",
            StepErrorKind::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StepErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Lifecycle of one conversion run as recorded in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    InProgress,
    Completed,
    CompletedWithFailures,
    Aborted,
}

impl RunState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::InProgress => "in_progress",
            RunState::Completed => "completed",
            RunState::CompletedWithFailures => "completed_with_failures",
            RunState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MergeMode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    #[default]
    Interactive,
    Auto,
    DryRun,
}

impl MergeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMode::Interactive => "interactive",
            MergeMode::Auto => "auto",
            MergeMode::DryRun => "dry-run",
        }
    }
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MergeMode {
    type Err = crate::error::ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interactive" => Ok(MergeMode::Interactive),
            "auto" => Ok(MergeMode::Auto),
            "dry-run" | "dry_run" => Ok(MergeMode::DryRun),
            _ => Err(crate::error::ConvertError::Usage(format!(
                "invalid mode '{s}': expected interactive, auto or dry-run"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ConflictStrategy
// ---------------------------------------------------------------------------

/// How changed members are resolved when merging without a human in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    #[default]
    Prompt,
    KeepExisting,
    UseGenerated,
}

impl ConflictStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictStrategy::Prompt => "prompt",
            ConflictStrategy::KeepExisting => "keep-existing",
            ConflictStrategy::UseGenerated => "use-generated",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConflictStrategy {
    type Err = crate::error::ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prompt" => Ok(ConflictStrategy::Prompt),
            "keep-existing" | "keep_existing" => Ok(ConflictStrategy::KeepExisting),
            "use-generated" | "use_generated" => Ok(ConflictStrategy::UseGenerated),
            _ => Err(crate::error::ConvertError::Usage(format!(
                "invalid conflict strategy '{s}': expected prompt, keep-existing or use-generated"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn step_order_matches_pipeline() {
        assert!(StepId::AnalyzeForm < StepId::AnalyzeData);
        assert!(StepId::GenerateModel < StepId::GenerateController);
        assert_eq!(StepId::WriteSummary.index(), 5);
    }

    #[test]
    fn step_roundtrip() {
        for step in StepId::all() {
            let parsed = StepId::from_str(step.as_str()).unwrap();
            assert_eq!(*step, parsed);
        }
    }

    #[test]
    fn step_accepts_hyphenated_names() {
        assert_eq!(
            StepId::from_str("generate-controller").unwrap(),
            StepId::GenerateController
        );
    }

    #[test]
    fn unknown_step_is_an_error() {
        assert!(StepId::from_str("compile_everything").is_err());
        assert!(StepId::from_str("").is_err());
    }

    #[test]
    fn step_serde_snake_case() {
        let json = serde_json::to_string(&StepId::GenerateViews).unwrap();
        assert_eq!(json, "\"generate_views\"");
        let parsed: StepId = serde_json::from_str("\"analyze_form\"").unwrap();
        assert_eq!(parsed, StepId::AnalyzeForm);
    }

    #[test]
    fn mode_roundtrip() {
        for mode in [MergeMode::Interactive, MergeMode::Auto, MergeMode::DryRun] {
            assert_eq!(MergeMode::from_str(mode.as_str()).unwrap(), mode);
        }
        // Config files use snake_case even where the CLI shows a hyphen
        assert_eq!(MergeMode::from_str("dry_run").unwrap(), MergeMode::DryRun);
        let json = serde_json::to_string(&MergeMode::DryRun).unwrap();
        assert_eq!(json, "\"dry_run\"");
    }

    #[test]
    fn strategy_roundtrip() {
        for s in [
            ConflictStrategy::Prompt,
            ConflictStrategy::KeepExisting,
            ConflictStrategy::UseGenerated,
        ] {
            assert_eq!(ConflictStrategy::from_str(s.as_str()).unwrap(), s);
        }
        assert_eq!(
            ConflictStrategy::from_str("keep_existing").unwrap(),
            ConflictStrategy::KeepExisting
        );
    }

    #[test]
    fn error_kind_serde() {
        let json = serde_json::to_string(&StepErrorKind::MissingDependency).unwrap();
        assert_eq!(json, "\"missing_dependency\"");
    }
}
