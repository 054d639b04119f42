use crate::cmd::{load_file_config, report_config_warnings, watch_interrupts};
use crate::output::{print_json, print_table};
use anyhow::Context;
use formport_core::backend::generator_for;
use formport_core::cancel::CancelToken;
use formport_core::config::{FlagOverrides, RunConfig};
use formport_core::discover;
use formport_core::orchestrator::{self, PlannedAction, RunOptions};
use formport_core::step;
use formport_core::types::StepId;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub struct RunArgs {
    /// Entity to convert (e.g. Vendor)
    #[arg(long)]
    pub entity: Option<String>,

    /// Legacy form to convert (e.g. frmVendor); implies the entity
    #[arg(long)]
    pub form_name: Option<String>,

    /// Override the configured output root
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Re-attempt pending and failed steps, keeping completed ones
    #[arg(long, conflicts_with = "rerun_failed")]
    pub resume: bool,

    /// Re-attempt failed steps only
    #[arg(long)]
    pub rerun_failed: bool,

    /// Steps to record as done without running (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "STEPS")]
    pub skip_steps: Vec<String>,

    /// Show the pass plan without calling the backend
    #[arg(long)]
    pub dry_run: bool,

    /// Backend model override
    #[arg(long)]
    pub model: Option<String>,

    /// Backend timeout override, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_seconds: Option<u64>,

    /// Tolerated so wrapper scripts can pass extra arguments through
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub extra: Vec<String>,
}

pub fn run(root: &Path, config: Option<&Path>, args: RunArgs, json: bool) -> anyhow::Result<()> {
    if !args.extra.is_empty() {
        eprintln!(
            "warning: ignoring unrecognised arguments: {}",
            args.extra.join(" ")
        );
    }

    let file_cfg = load_file_config(root, config)?;
    let source_root = root.join(&file_cfg.source_root);
    let entity = resolve_entity(&args, &source_root)?;

    let overrides = FlagOverrides {
        output_root: args.output.clone(),
        model: args.model.clone(),
        timeout_seconds: args.timeout_seconds,
        ..Default::default()
    };
    let mut cfg = RunConfig::resolve(root, &file_cfg, &entity, &overrides)?;
    cfg.form_name = args
        .form_name
        .clone()
        .or_else(|| discover::form_name_for_entity(&cfg.source_root, &entity));

    let mut skip = Vec::new();
    for name in &args.skip_steps {
        skip.push(name.parse::<StepId>()?);
    }
    let opts = RunOptions {
        resume: args.resume,
        rerun_failed: args.rerun_failed,
        skip,
    };

    if args.dry_run {
        return show_plan(&cfg, &opts, json);
    }

    report_config_warnings(&cfg)?;

    let generator = generator_for(&cfg.backend);
    let cancel = CancelToken::new();
    watch_interrupts(cancel.clone());

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = runtime.block_on(orchestrator::run_pipeline(
        &cfg,
        &opts,
        generator.as_ref(),
        &cancel,
    ))?;

    let manifest = &report.manifest;
    if json {
        #[derive(serde::Serialize)]
        struct Output<'a> {
            entity: &'a str,
            run_state: &'static str,
            attempted: usize,
            succeeded: usize,
            failed: usize,
            skipped: usize,
            cancelled: bool,
            steps: &'a [formport_core::manifest::StepStatus],
        }

        print_json(&Output {
            entity: &manifest.entity,
            run_state: manifest.run_state.as_str(),
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed: report.failed,
            skipped: report.skipped,
            cancelled: report.cancelled,
            steps: &manifest.steps,
        })?;
    } else {
        print_table(
            &["STEP", "STATE", "ERROR"],
            super::status::step_rows(&manifest.steps),
        );
        println!();
        println!(
            "{} attempted, {} succeeded, {} failed, {} skipped",
            report.attempted, report.succeeded, report.failed, report.skipped
        );
    }

    if report.cancelled {
        anyhow::bail!(
            "run interrupted; resume with: formport run --entity {} --resume",
            manifest.entity
        );
    }
    if report.failed > 0 {
        let failed: Vec<String> = manifest
            .failed_steps()
            .iter()
            .map(|s| match s.error_kind {
                Some(kind) => format!("{} ({})", s.step, kind),
                None => s.step.to_string(),
            })
            .collect();
        anyhow::bail!("{} step(s) failed: {}", report.failed, failed.join(", "));
    }

    if !json {
        println!();
        println!("Conversion complete.");
        println!("Next: formport deploy --entity {}", manifest.entity);
    }
    Ok(())
}

/// Decide which entity this invocation converts: the explicit flag, the
/// form name mapped through the naming convention, or an interactive pick
/// from the discovered forms. Without a terminal the pick is an error.
fn resolve_entity(args: &RunArgs, source_root: &Path) -> anyhow::Result<String> {
    if let Some(entity) = &args.entity {
        return Ok(entity.clone());
    }
    if let Some(form) = &args.form_name {
        return Ok(discover::entity_for_form(form));
    }
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("no entity given: pass --entity or --form-name");
    }

    let forms = discover::discover_forms(source_root)
        .with_context(|| format!("failed to scan {}", source_root.display()))?;
    if forms.is_empty() {
        anyhow::bail!("no legacy forms found under {}", source_root.display());
    }

    eprintln!("Select a form to convert:");
    for (i, form) in forms.iter().enumerate() {
        eprintln!(
            "  {}. {} (entity {})",
            i + 1,
            form.form_name,
            discover::entity_for_form(&form.form_name)
        );
    }
    eprint!("Choice [1-{}]: ", forms.len());
    use std::io::Write;
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let choice: usize = line
        .trim()
        .parse()
        .with_context(|| format!("not a number: '{}'", line.trim()))?;
    if choice == 0 || choice > forms.len() {
        anyhow::bail!("choice {} is out of range", choice);
    }
    Ok(discover::entity_for_form(&forms[choice - 1].form_name))
}

fn show_plan(cfg: &RunConfig, opts: &RunOptions, json: bool) -> anyhow::Result<()> {
    let planned = orchestrator::plan(cfg, opts)?;

    if json {
        #[derive(serde::Serialize)]
        struct Row {
            step: &'static str,
            action: &'static str,
            output: String,
        }

        let rows: Vec<Row> = planned
            .iter()
            .map(|p| Row {
                step: p.step.as_str(),
                action: action_label(p.action),
                output: step::spec_for(p.step).output.rel_path(&cfg.entity),
            })
            .collect();
        return print_json(&rows);
    }

    println!("Plan for '{}':", cfg.entity);
    println!();
    let rows: Vec<Vec<String>> = planned
        .iter()
        .map(|p| {
            vec![
                p.step.to_string(),
                action_label(p.action).to_string(),
                step::spec_for(p.step).output.rel_path(&cfg.entity),
            ]
        })
        .collect();
    print_table(&["STEP", "ACTION", "OUTPUT"], rows);
    Ok(())
}

fn action_label(action: PlannedAction) -> &'static str {
    match action {
        PlannedAction::Run => "run",
        PlannedAction::Skip => "skip",
        PlannedAction::AlreadyDone => "already done",
        PlannedAction::NotSelected => "-",
    }
}
