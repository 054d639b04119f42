use crate::cmd::{display_path, load_file_config, report_config_warnings, watch_interrupts};
use crate::output::{print_json, print_table};
use formport_core::cancel::CancelToken;
use formport_core::config::{FlagOverrides, RunConfig};
use formport_core::merge::{FileOutcome, MergeSession};
use formport_core::prompter::ConsolePrompter;
use formport_core::types::{ConflictStrategy, MergeMode};
use std::path::Path;

#[derive(clap::Args)]
pub struct MergeArgs {
    /// Entity whose generated members to fold in
    #[arg(long)]
    pub entity: String,

    /// interactive, auto or dry-run (default from formport.json)
    #[arg(long)]
    pub mode: Option<String>,

    /// prompt, keep-existing or use-generated
    #[arg(long)]
    pub conflict_strategy: Option<String>,

    /// Shorthand for --mode dry-run
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(root: &Path, config: Option<&Path>, args: MergeArgs, json: bool) -> anyhow::Result<()> {
    let mode = if args.dry_run {
        Some(MergeMode::DryRun)
    } else {
        match &args.mode {
            Some(s) => Some(s.parse::<MergeMode>()?),
            None => None,
        }
    };
    let conflict_strategy = match &args.conflict_strategy {
        Some(s) => Some(s.parse::<ConflictStrategy>()?),
        None => None,
    };

    let file_cfg = load_file_config(root, config)?;
    let overrides = FlagOverrides {
        mode,
        conflict_strategy,
        ..Default::default()
    };
    let cfg = RunConfig::resolve(root, &file_cfg, &args.entity, &overrides)?;
    report_config_warnings(&cfg)?;

    let cancel = CancelToken::new();
    watch_interrupts(cancel.clone());

    let mut prompter = ConsolePrompter;
    let mut session =
        MergeSession::new(cfg.mode, cfg.conflict_strategy, &mut prompter, cancel.clone());
    let report = session.merge_entity(&cfg)?;

    if json {
        #[derive(serde::Serialize)]
        struct FileRow {
            file: String,
            result: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            added: Option<usize>,
            #[serde(skip_serializing_if = "Option::is_none")]
            replaced: Option<usize>,
            #[serde(skip_serializing_if = "Option::is_none")]
            usings_added: Option<usize>,
        }

        #[derive(serde::Serialize)]
        struct Output {
            entity: String,
            mode: &'static str,
            conflict_strategy: &'static str,
            conflicts: usize,
            interrupted: bool,
            files: Vec<FileRow>,
        }

        let files: Vec<FileRow> = report
            .files
            .iter()
            .map(|(path, outcome)| {
                let (result, counts) = match outcome {
                    FileOutcome::Identical => ("identical", None),
                    FileOutcome::Kept => ("kept", None),
                    FileOutcome::Merged {
                        added,
                        replaced,
                        usings_added,
                    } => ("merged", Some((*added, *replaced, *usings_added))),
                    FileOutcome::Planned {
                        added,
                        replaced,
                        usings_added,
                    } => ("planned", Some((*added, *replaced, *usings_added))),
                };
                FileRow {
                    file: display_path(root, path),
                    result,
                    added: counts.map(|c| c.0),
                    replaced: counts.map(|c| c.1),
                    usings_added: counts.map(|c| c.2),
                }
            })
            .collect();
        print_json(&Output {
            entity: cfg.entity.clone(),
            mode: cfg.mode.as_str(),
            conflict_strategy: cfg.conflict_strategy.as_str(),
            conflicts: report.conflicts,
            interrupted: cancel.is_cancelled(),
            files,
        })?;
    } else if report.files.is_empty() {
        println!(
            "Nothing to merge for '{}': no generated .cs file has a deployed counterpart \
             (new files are placed by 'formport deploy')",
            cfg.entity
        );
    } else {
        let rows: Vec<Vec<String>> = report
            .files
            .iter()
            .map(|(path, outcome)| vec![display_path(root, path), outcome_cell(outcome)])
            .collect();
        print_table(&["FILE", "RESULT"], rows);
        if report.conflicts > 0 {
            println!();
            println!("{} conflicting member(s) needed a decision", report.conflicts);
        }
    }

    if cancel.is_cancelled() {
        anyhow::bail!("merge interrupted; decisions already applied were kept");
    }
    Ok(())
}

fn outcome_cell(outcome: &FileOutcome) -> String {
    match outcome {
        FileOutcome::Identical => "identical".to_string(),
        FileOutcome::Kept => "kept existing".to_string(),
        FileOutcome::Merged {
            added,
            replaced,
            usings_added,
        } => format!("merged ({added} added, {replaced} replaced, {usings_added} usings)"),
        FileOutcome::Planned {
            added,
            replaced,
            usings_added,
        } => format!("would merge ({added} added, {replaced} replaced, {usings_added} usings)"),
    }
}
