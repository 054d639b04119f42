use crate::backend::Generator;
use crate::cancel::CancelToken;
use crate::config::RunConfig;
use crate::discover;
use crate::error::Result;
use crate::lock::EntityLock;
use crate::manifest::RunManifest;
use crate::paths;
use crate::step::{self, PIPELINE};
use crate::types::{StepErrorKind, StepId, StepState};

// ---------------------------------------------------------------------------
// Run options and planning
// ---------------------------------------------------------------------------

/// Pass-selection flags for one `run` invocation.
///
/// A plain pass resets the manifest and runs everything. `resume` attempts
/// pending and failed steps while leaving successes alone; `rerun_failed`
/// attempts only failed steps. Steps in `skip` are recorded as succeeded
/// without running, and without fabricating their artifacts.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub resume: bool,
    pub rerun_failed: bool,
    pub skip: Vec<StepId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Run,
    Skip,
    AlreadyDone,
    NotSelected,
}

#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub step: StepId,
    pub action: PlannedAction,
}

impl RunOptions {
    /// What this invocation does with a step, given its recorded state.
    /// A plain pass behaves as if every step were still pending.
    pub fn action_for(&self, step: StepId, state: StepState) -> PlannedAction {
        let effective = if self.resume || self.rerun_failed {
            state
        } else {
            StepState::Pending
        };
        if self.skip.contains(&step) && effective != StepState::Succeeded {
            return PlannedAction::Skip;
        }
        match effective {
            StepState::Succeeded => PlannedAction::AlreadyDone,
            StepState::Failed | StepState::Running => PlannedAction::Run,
            StepState::Pending => {
                if self.rerun_failed {
                    PlannedAction::NotSelected
                } else {
                    PlannedAction::Run
                }
            }
        }
    }
}

/// Preview a pass without touching anything on disk.
pub fn plan(cfg: &RunConfig, opts: &RunOptions) -> Result<Vec<PlannedStep>> {
    let path = paths::manifest_path(&cfg.output_root, &cfg.entity);
    let mut manifest = RunManifest::load_or_new(&path, &cfg.entity, cfg.form_name.clone())?;
    manifest.recover_interrupted();
    Ok(PIPELINE
        .iter()
        .map(|spec| PlannedStep {
            step: spec.id,
            action: opts.action_for(spec.id, manifest.state_of(spec.id)),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// What one pass did. Counters cover this pass only; `manifest` is the full
/// on-disk state after it.
#[derive(Debug)]
pub struct RunReport {
    pub manifest: RunManifest,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

impl RunReport {
    /// True when the pass ran to the end with no step failing.
    pub fn clean(&self) -> bool {
        !self.cancelled && self.failed == 0
    }
}

// ---------------------------------------------------------------------------
// Pipeline execution
// ---------------------------------------------------------------------------

/// Run one conversion pass for the configured entity.
///
/// The manifest is saved after every state transition, and a step is marked
/// `Running` before its backend call goes out, so a crash at any point
/// leaves a file the next invocation can recover from. A step whose
/// dependency did not succeed is failed immediately without a backend call;
/// steps on unaffected branches still run.
pub async fn run_pipeline(
    cfg: &RunConfig,
    opts: &RunOptions,
    generator: &dyn Generator,
    cancel: &CancelToken,
) -> Result<RunReport> {
    let _lock = EntityLock::acquire(&cfg.output_root, &cfg.entity)?;

    let manifest_path = paths::manifest_path(&cfg.output_root, &cfg.entity);
    let mut manifest =
        RunManifest::load_or_new(&manifest_path, &cfg.entity, cfg.form_name.clone())?;

    let recovered = manifest.recover_interrupted();
    if recovered > 0 {
        tracing::warn!(
            entity = %cfg.entity,
            steps = recovered,
            "previous run died mid-step; interrupted steps marked failed"
        );
    }
    if manifest.form_name.is_none() {
        manifest.form_name = cfg.form_name.clone();
    }
    if !opts.resume && !opts.rerun_failed {
        manifest.reset_all();
    }

    let sources = discover::form_sources(&cfg.source_root, &cfg.entity)?;
    tracing::debug!(entity = %cfg.entity, sources = sources.len(), "resolved legacy sources");

    manifest.begin_run();
    manifest.save(&manifest_path)?;

    let mut attempted = 0usize;
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;
    let mut cancelled = false;

    for spec in PIPELINE {
        if cancel.is_cancelled() {
            tracing::warn!(entity = %cfg.entity, step = %spec.id, "cancelled before step");
            manifest.abort_run();
            manifest.save(&manifest_path)?;
            cancelled = true;
            break;
        }

        match opts.action_for(spec.id, manifest.state_of(spec.id)) {
            PlannedAction::AlreadyDone | PlannedAction::NotSelected => continue,
            PlannedAction::Skip => {
                manifest.mark_skipped(spec.id);
                manifest.save(&manifest_path)?;
                skipped += 1;
                tracing::info!(step = %spec.id, "skipped on request");
                continue;
            }
            PlannedAction::Run => {}
        }

        if let Some(dep) = spec
            .requires
            .iter()
            .find(|d| manifest.state_of(**d) != StepState::Succeeded)
        {
            attempted += 1;
            failed += 1;
            tracing::warn!(step = %spec.id, dependency = %dep, "dependency did not succeed; failing fast");
            manifest.mark_failed(
                spec.id,
                StepErrorKind::MissingDependency,
                format!("dependency '{dep}' did not succeed"),
            );
            manifest.save(&manifest_path)?;
            continue;
        }

        attempted += 1;
        manifest.mark_running(spec.id);
        manifest.save(&manifest_path)?;

        match step::run_step(spec, cfg, &sources, generator).await {
            Ok(path) => {
                manifest.mark_succeeded(spec.id);
                manifest.save(&manifest_path)?;
                succeeded += 1;
                tracing::info!(step = %spec.id, artifact = %path.display(), "step succeeded");
            }
            Err(failure) => {
                tracing::error!(step = %spec.id, kind = %failure.kind, "step failed: {}", failure.message);
                manifest.mark_failed(spec.id, failure.kind, failure.message);
                manifest.save(&manifest_path)?;
                failed += 1;
            }
        }
    }

    if !cancelled {
        manifest.finish_run();
        manifest.save(&manifest_path)?;
    }

    Ok(RunReport {
        manifest,
        attempted,
        succeeded,
        failed,
        skipped,
        cancelled,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
