use crate::error::Result;
use crate::io;
use crate::types::{RunState, StepErrorKind, StepId, StepState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatus {
    pub step: StepId,
    pub state: StepState,
    /// Set when the step was forced past by `--skip-steps` rather than run.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_kind: Option<StepErrorKind>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl StepStatus {
    fn pending(step: StepId) -> Self {
        Self {
            step,
            state: StepState::Pending,
            skipped: false,
            started_at: None,
            finished_at: None,
            error_kind: None,
            error_message: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// Per-entity pipeline state at `output/{Entity}/conversion-status.json`.
///
/// Created on the first run for an entity, loaded and updated on every later
/// pass, and never deleted by the tool. Persisted with an atomic write after
/// every state transition so a crash at any point leaves a resumable file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_version")]
    pub version: u32,
    pub entity: String,
    #[serde(default)]
    pub form_name: Option<String>,
    pub run_state: RunState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub steps: Vec<StepStatus>,
}

fn default_version() -> u32 {
    1
}

impl RunManifest {
    pub fn new(entity: impl Into<String>, form_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            version: 1,
            entity: entity.into(),
            form_name,
            run_state: RunState::NotStarted,
            created_at: now,
            updated_at: now,
            steps: StepId::all().iter().map(|s| StepStatus::pending(*s)).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let mut manifest: RunManifest = serde_json::from_str(&data)?;
        manifest.ensure_steps();
        Ok(manifest)
    }

    /// Load the manifest when it exists, otherwise start a fresh one.
    pub fn load_or_new(path: &Path, entity: &str, form_name: Option<String>) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(entity, form_name))
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        io::atomic_write(path, data.as_bytes())
    }

    /// Bring the step list in line with the canonical pipeline: add entries
    /// for steps a newer binary knows about and order them canonically.
    /// Unknown steps cannot appear (serde rejects them at parse time).
    fn ensure_steps(&mut self) {
        let mut steps: Vec<StepStatus> = Vec::with_capacity(StepId::all().len());
        for id in StepId::all() {
            match self.steps.iter().find(|s| s.step == *id) {
                Some(existing) => steps.push(existing.clone()),
                None => steps.push(StepStatus::pending(*id)),
            }
        }
        self.steps = steps;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn status(&self, step: StepId) -> &StepStatus {
        // ensure_steps guarantees one entry per canonical step
        self.steps
            .iter()
            .find(|s| s.step == step)
            .expect("manifest holds every pipeline step")
    }

    pub fn state_of(&self, step: StepId) -> StepState {
        self.status(step).state
    }

    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(|s| s.state == StepState::Succeeded)
    }

    pub fn failed_steps(&self) -> Vec<&StepStatus> {
        self.steps
            .iter()
            .filter(|s| s.state == StepState::Failed)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// A previous process died mid-step: anything still `Running` on load is
    /// converted to `Failed` so resume semantics stay simple.
    pub fn recover_interrupted(&mut self) -> usize {
        let mut recovered = 0;
        for s in &mut self.steps {
            if s.state == StepState::Running {
                s.state = StepState::Failed;
                s.finished_at = Some(Utc::now());
                s.error_kind = Some(StepErrorKind::BackendFailure);
                s.error_message =
                    Some("interrupted: step was still running when the process died".to_string());
                recovered += 1;
            }
        }
        if recovered > 0 {
            self.touch();
        }
        recovered
    }

    /// Reset everything to `Pending` for a from-scratch pass.
    pub fn reset_all(&mut self) {
        for s in &mut self.steps {
            *s = StepStatus::pending(s.step);
        }
        self.touch();
    }

    pub fn begin_run(&mut self) {
        self.run_state = RunState::InProgress;
        self.touch();
    }

    pub fn mark_running(&mut self, step: StepId) {
        let s = self.status_mut(step);
        s.state = StepState::Running;
        s.skipped = false;
        s.started_at = Some(Utc::now());
        s.finished_at = None;
        s.error_kind = None;
        s.error_message = None;
        self.touch();
    }

    pub fn mark_succeeded(&mut self, step: StepId) {
        let s = self.status_mut(step);
        s.state = StepState::Succeeded;
        s.finished_at = Some(Utc::now());
        s.error_kind = None;
        s.error_message = None;
        self.touch();
    }

    pub fn mark_failed(&mut self, step: StepId, kind: StepErrorKind, message: impl Into<String>) {
        let s = self.status_mut(step);
        s.state = StepState::Failed;
        if s.started_at.is_none() {
            s.started_at = Some(Utc::now());
        }
        s.finished_at = Some(Utc::now());
        s.error_kind = Some(kind);
        s.error_message = Some(message.into());
        self.touch();
    }

    /// `--skip-steps`: the step counts as done without running, but its
    /// artifact is not fabricated, so dependents may still fail.
    pub fn mark_skipped(&mut self, step: StepId) {
        let s = self.status_mut(step);
        s.state = StepState::Succeeded;
        s.skipped = true;
        s.started_at = None;
        s.finished_at = Some(Utc::now());
        s.error_kind = None;
        s.error_message = None;
        self.touch();
    }

    /// Close out the run: `Completed` iff every step succeeded.
    pub fn finish_run(&mut self) {
        self.run_state = if self.all_succeeded() {
            RunState::Completed
        } else {
            RunState::CompletedWithFailures
        };
        self.touch();
    }

    pub fn abort_run(&mut self) {
        self.run_state = RunState::Aborted;
        self.touch();
    }

    fn status_mut(&mut self, step: StepId) -> &mut StepStatus {
        self.steps
            .iter_mut()
            .find(|s| s.step == step)
            .expect("manifest holds every pipeline step")
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
