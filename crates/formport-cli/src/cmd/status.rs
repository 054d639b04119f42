use crate::cmd::load_file_config;
use crate::output::{print_json, print_table, truncate};
use anyhow::Context;
use chrono::{DateTime, Utc};
use formport_core::manifest::{RunManifest, StepStatus};
use formport_core::paths;
use formport_core::types::StepState;
use std::path::Path;

#[derive(clap::Args)]
pub struct StatusArgs {
    /// Entity to show (omit to list every conversion)
    #[arg(long)]
    pub entity: Option<String>,
}

pub fn run(root: &Path, config: Option<&Path>, args: StatusArgs, json: bool) -> anyhow::Result<()> {
    let file_cfg = load_file_config(root, config)?;
    let output_root = root.join(&file_cfg.output_root);

    match args.entity.as_deref() {
        Some(entity) => show_entity(&output_root, entity, json),
        None => list_all(&output_root, json),
    }
}

fn show_entity(output_root: &Path, entity: &str, json: bool) -> anyhow::Result<()> {
    paths::validate_entity(entity)?;
    let path = paths::manifest_path(output_root, entity);
    if !path.is_file() {
        anyhow::bail!(
            "no conversion state for '{entity}': run 'formport run --entity {entity}' first"
        );
    }
    let manifest =
        RunManifest::load(&path).with_context(|| format!("failed to load {}", path.display()))?;

    if json {
        return print_json(&manifest);
    }

    println!("Entity:    {}", manifest.entity);
    if let Some(form) = &manifest.form_name {
        println!("Form:      {form}");
    }
    println!("Run state: {}", manifest.run_state);
    println!(
        "Updated:   {}",
        manifest.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();
    print_table(&["STEP", "STATE", "ERROR"], step_rows(&manifest.steps));
    Ok(())
}

fn list_all(output_root: &Path, json: bool) -> anyhow::Result<()> {
    let mut manifests: Vec<RunManifest> = Vec::new();

    if output_root.is_dir() {
        let mut dirs: Vec<_> = std::fs::read_dir(output_root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        for dir in dirs {
            let path = dir.join(paths::MANIFEST_FILE);
            if !path.is_file() {
                continue;
            }
            match RunManifest::load(&path) {
                Ok(m) => manifests.push(m),
                // One corrupt manifest must not hide the others
                Err(e) => eprintln!("warning: skipping unreadable {}: {e}", path.display()),
            }
        }
    }

    if json {
        #[derive(serde::Serialize)]
        struct Summary<'a> {
            entity: &'a str,
            form_name: Option<&'a str>,
            run_state: &'static str,
            done: usize,
            total: usize,
            updated_at: &'a DateTime<Utc>,
        }

        let rows: Vec<Summary> = manifests
            .iter()
            .map(|m| Summary {
                entity: &m.entity,
                form_name: m.form_name.as_deref(),
                run_state: m.run_state.as_str(),
                done: done_count(m),
                total: m.steps.len(),
                updated_at: &m.updated_at,
            })
            .collect();
        return print_json(&rows);
    }

    if manifests.is_empty() {
        println!("No conversions yet. Run: formport run --entity <Name>");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = manifests
        .iter()
        .map(|m| {
            vec![
                m.entity.clone(),
                m.run_state.to_string(),
                format!("{}/{}", done_count(m), m.steps.len()),
                m.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print_table(&["ENTITY", "RUN STATE", "STEPS", "UPDATED"], rows);
    Ok(())
}

fn done_count(m: &RunManifest) -> usize {
    m.steps
        .iter()
        .filter(|s| s.state == StepState::Succeeded)
        .count()
}

pub fn step_rows(steps: &[StepStatus]) -> Vec<Vec<String>> {
    steps
        .iter()
        .map(|s| {
            let state = if s.skipped {
                format!("{} (skipped)", s.state)
            } else {
                s.state.to_string()
            };
            let error = match (&s.error_kind, &s.error_message) {
                (Some(kind), Some(msg)) => format!("{kind}: {}", truncate(msg, 60)),
                (Some(kind), None) => kind.to_string(),
                _ => String::new(),
            };
            vec![s.step.to_string(), state, error]
        })
        .collect()
}
