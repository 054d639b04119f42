use crate::analysis::{DataAccessAnalysis, FormAnalysis};
use crate::backend::{GenRequest, Generator};
use crate::config::RunConfig;
use crate::io;
use crate::paths;
use crate::prompt::{self, PromptInput};
use crate::types::{StepErrorKind, StepId};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Artifact kinds and specs
// ---------------------------------------------------------------------------

/// What a step's output file is, which decides how it is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    FormAnalysisJson,
    DataAccessJson,
    CSharpSource,
    RazorView,
    MarkdownDoc,
}

impl ArtifactKind {
    /// Check an artifact body against the shape this kind promises. JSON
    /// kinds are parsed and validated; text kinds must not be empty.
    pub fn check(self, text: &str) -> Result<(), String> {
        match self {
            ArtifactKind::FormAnalysisJson => {
                let parsed: FormAnalysis =
                    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
                parsed.validate()
            }
            ArtifactKind::DataAccessJson => {
                let parsed: DataAccessAnalysis =
                    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
                parsed.validate()
            }
            ArtifactKind::CSharpSource | ArtifactKind::RazorView | ArtifactKind::MarkdownDoc => {
                if text.trim().is_empty() {
                    Err("generated output is empty".to_string())
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Where a step's output lands, relative to the entity directory.
/// `{entity}` in the path is substituted at runtime.
#[derive(Debug)]
pub struct ArtifactSpec {
    pub kind: ArtifactKind,
    rel: &'static str,
}

impl ArtifactSpec {
    /// The raw path template, `{entity}` placeholder included.
    pub fn rel_template(&self) -> &'static str {
        self.rel
    }

    pub fn rel_path(&self, entity: &str) -> String {
        self.rel.replace("{entity}", entity)
    }

    pub fn path(&self, output_root: &Path, entity: &str) -> PathBuf {
        paths::artifact_path(output_root, entity, &self.rel_path(entity))
    }
}

// ---------------------------------------------------------------------------
// The pipeline table
// ---------------------------------------------------------------------------

/// Static description of one pipeline step.
#[derive(Debug)]
pub struct StepSpec {
    pub id: StepId,
    /// Upstream steps whose artifacts feed this step's prompt.
    pub requires: &'static [StepId],
    /// Whether the prompt includes the legacy VB sources.
    reads_sources: bool,
    pub output: ArtifactSpec,
    pub template: &'static str,
}

/// The conversion pipeline. Table order matches [`StepId::all`], and
/// `requires` only ever points upstream, so a single in-order pass visits
/// every dependency before its dependents.
pub static PIPELINE: &[StepSpec] = &[
    StepSpec {
        id: StepId::AnalyzeForm,
        requires: &[],
        reads_sources: true,
        output: ArtifactSpec {
            kind: ArtifactKind::FormAnalysisJson,
            rel: "analysis/form-analysis.json",
        },
        template: include_str!("templates/analyze_form.md"),
    },
    StepSpec {
        id: StepId::AnalyzeData,
        requires: &[],
        reads_sources: true,
        output: ArtifactSpec {
            kind: ArtifactKind::DataAccessJson,
            rel: "analysis/data-access.json",
        },
        template: include_str!("templates/analyze_data.md"),
    },
    StepSpec {
        id: StepId::GenerateModel,
        requires: &[StepId::AnalyzeForm],
        reads_sources: false,
        output: ArtifactSpec {
            kind: ArtifactKind::CSharpSource,
            rel: "generated/Models/{entity}.cs",
        },
        template: include_str!("templates/generate_model.md"),
    },
    StepSpec {
        id: StepId::GenerateController,
        requires: &[StepId::AnalyzeData, StepId::GenerateModel],
        reads_sources: false,
        output: ArtifactSpec {
            kind: ArtifactKind::CSharpSource,
            rel: "generated/Controllers/{entity}Controller.cs",
        },
        template: include_str!("templates/generate_controller.md"),
    },
    StepSpec {
        id: StepId::GenerateViews,
        requires: &[StepId::GenerateModel],
        reads_sources: false,
        output: ArtifactSpec {
            kind: ArtifactKind::RazorView,
            rel: "generated/Views/{entity}/Index.cshtml",
        },
        template: include_str!("templates/generate_views.md"),
    },
    StepSpec {
        id: StepId::WriteSummary,
        requires: &[StepId::GenerateController, StepId::GenerateViews],
        reads_sources: false,
        output: ArtifactSpec {
            kind: ArtifactKind::MarkdownDoc,
            rel: "generated/CONVERSION.md",
        },
        template: include_str!("templates/write_summary.md"),
    },
];

pub fn spec_for(id: StepId) -> &'static StepSpec {
    &PIPELINE[id.index()]
}

// ---------------------------------------------------------------------------
// Step execution
// ---------------------------------------------------------------------------

/// A step failure as data. The orchestrator records it in the manifest and
/// decides what it means for the rest of the run; nothing unwinds.
#[derive(Debug, Clone)]
pub struct StepFailure {
    pub kind: StepErrorKind,
    pub message: String,
}

pub type StepOutcome = std::result::Result<PathBuf, StepFailure>;

fn fail(kind: StepErrorKind, message: impl Into<String>) -> StepOutcome {
    Err(StepFailure {
        kind,
        message: message.into(),
    })
}

/// Execute one step end to end: gather inputs, call the backend, validate
/// the response, write the artifact.
///
/// Inputs are checked before the backend is invoked, so a missing
/// dependency never costs a generation.
pub async fn run_step(
    spec: &StepSpec,
    cfg: &RunConfig,
    sources: &[PathBuf],
    generator: &dyn Generator,
) -> StepOutcome {
    let entity = &cfg.entity;
    let form_name = cfg.form_name.as_deref().unwrap_or(entity);

    let mut source_inputs = Vec::new();
    if spec.reads_sources {
        if sources.is_empty() {
            return fail(
                StepErrorKind::MissingDependency,
                format!("no legacy sources found for entity '{entity}'"),
            );
        }
        for path in sources {
            let text = match std::fs::read_to_string(path) {
                Ok(t) => t,
                Err(e) => {
                    return fail(
                        StepErrorKind::MissingDependency,
                        format!("cannot read legacy source {}: {e}", path.display()),
                    )
                }
            };
            source_inputs.push(PromptInput::new(file_label(path), text));
        }
    }

    let mut artifact_inputs = Vec::new();
    for dep in spec.requires {
        let dep_spec = spec_for(*dep);
        let rel = dep_spec.output.rel_path(entity);
        let path = dep_spec.output.path(&cfg.output_root, entity);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                return fail(
                    StepErrorKind::MissingDependency,
                    format!("artifact '{rel}' from step '{dep}' is unavailable: {e}"),
                )
            }
        };
        // An upstream artifact that no longer parses is as good as absent;
        // the fix is to re-run the step that produced it.
        if let Err(reason) = dep_spec.output.kind.check(&text) {
            return fail(
                StepErrorKind::MissingDependency,
                format!("artifact '{rel}' from step '{dep}' is unusable: {reason}"),
            );
        }
        artifact_inputs.push(PromptInput::new(file_label(&path), text));
    }

    tracing::info!(step = %spec.id, entity = %entity, "running step");
    let prompt_text =
        prompt::build_prompt(spec, entity, form_name, &source_inputs, &artifact_inputs);
    let raw = match generator
        .generate(&GenRequest {
            step: spec.id,
            prompt: prompt_text,
        })
        .await
    {
        Ok(text) => text,
        Err(e) => return fail(StepErrorKind::BackendFailure, e.to_string()),
    };

    let cleaned = prompt::strip_code_fence(&raw);
    if let Err(reason) = spec.output.kind.check(cleaned) {
        return fail(
            StepErrorKind::MalformedOutput,
            format!("step produced unusable output: {reason}"),
        );
    }

    let path = spec.output.path(&cfg.output_root, entity);
    let mut body = cleaned.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    if let Err(e) = io::atomic_write(&path, body.as_bytes()) {
        return fail(
            StepErrorKind::WriteFailed,
            format!("cannot write {}: {e}", path.display()),
        );
    }
    tracing::debug!(step = %spec.id, path = %path.display(), "artifact written");
    Ok(path)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
