use crate::cmd::{display_path, load_file_config};
use crate::output::{print_json, print_table};
use formport_core::config::{FlagOverrides, RunConfig};
use formport_core::deploy::{self, DeployAction};
use formport_core::paths;
use std::path::Path;

#[derive(clap::Args)]
pub struct DeployArgs {
    /// Entity whose generated files to place
    #[arg(long)]
    pub entity: String,

    /// Report what would be copied without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(root: &Path, config: Option<&Path>, args: DeployArgs, json: bool) -> anyhow::Result<()> {
    let file_cfg = load_file_config(root, config)?;
    let cfg = RunConfig::resolve(root, &file_cfg, &args.entity, &FlagOverrides::default())?;

    let report = deploy::deploy_entity(&cfg, args.dry_run)?;
    let gen_dir = paths::generated_dir(&cfg.output_root, &cfg.entity);

    if json {
        #[derive(serde::Serialize)]
        struct Item {
            file: String,
            target: Option<String>,
            action: &'static str,
        }

        #[derive(serde::Serialize)]
        struct Output {
            entity: String,
            dry_run: bool,
            copied: usize,
            skipped: usize,
            unmapped: usize,
            items: Vec<Item>,
        }

        let items: Vec<Item> = report
            .items
            .iter()
            .map(|item| Item {
                file: display_path(&gen_dir, &item.source),
                target: item.target.as_deref().map(|t| display_path(root, t)),
                action: action_label(item.action, args.dry_run),
            })
            .collect();
        return print_json(&Output {
            entity: cfg.entity.clone(),
            dry_run: args.dry_run,
            copied: report.copied,
            skipped: report.skipped,
            unmapped: report.unmapped,
            items,
        });
    }

    if report.items.is_empty() {
        println!("Nothing to deploy for '{}'.", cfg.entity);
        return Ok(());
    }

    let rows: Vec<Vec<String>> = report
        .items
        .iter()
        .map(|item| {
            let target = match &item.target {
                Some(t) => display_path(root, t),
                None => "-".to_string(),
            };
            vec![
                display_path(&gen_dir, &item.source),
                action_label(item.action, args.dry_run).to_string(),
                target,
            ]
        })
        .collect();
    print_table(&["FILE", "ACTION", "TARGET"], rows);

    println!();
    println!(
        "{} copied, {} already present, {} unmapped{}",
        report.copied,
        report.skipped,
        report.unmapped,
        if args.dry_run { " (dry run)" } else { "" }
    );
    Ok(())
}

fn action_label(action: DeployAction, dry_run: bool) -> &'static str {
    match action {
        DeployAction::Copied if dry_run => "would copy",
        DeployAction::Copied => "copied",
        DeployAction::SkippedExisting => "exists",
        DeployAction::Unmapped => "unmapped",
    }
}
