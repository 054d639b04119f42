use crate::cmd::{display_path, load_file_config};
use crate::output::print_json;
use formport_core::config::{FlagOverrides, RunConfig};
use formport_core::rollback;
use std::path::Path;

#[derive(clap::Args)]
pub struct RollbackArgs {
    /// Entity whose merged files to restore
    #[arg(long)]
    pub entity: String,

    /// List what would be restored without touching anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(
    root: &Path,
    config: Option<&Path>,
    args: RollbackArgs,
    json: bool,
) -> anyhow::Result<()> {
    let file_cfg = load_file_config(root, config)?;
    let cfg = RunConfig::resolve(root, &file_cfg, &args.entity, &FlagOverrides::default())?;

    let report = rollback::rollback_entity(&cfg, args.dry_run)?;

    if json {
        #[derive(serde::Serialize)]
        struct Output {
            entity: String,
            dry_run: bool,
            restored: Vec<String>,
            missing: Vec<String>,
        }

        return print_json(&Output {
            entity: cfg.entity.clone(),
            dry_run: args.dry_run,
            restored: report
                .restored
                .iter()
                .map(|p| display_path(root, p))
                .collect(),
            missing: report
                .missing
                .iter()
                .map(|p| display_path(root, p))
                .collect(),
        });
    }

    if report.restored.is_empty() && report.missing.is_empty() {
        println!("No backups found for '{}'.", cfg.entity);
        return Ok(());
    }

    let verb = if args.dry_run { "would restore" } else { "restored" };
    for path in &report.restored {
        println!("  {verb}: {}", display_path(root, path));
    }
    for path in &report.missing {
        println!("  no backup: {}", display_path(root, path));
    }

    println!();
    if args.dry_run {
        println!(
            "{} to restore, {} without a backup (dry run)",
            report.restored.len(),
            report.missing.len()
        );
    } else {
        println!(
            "{} restored, {} without a backup",
            report.restored.len(),
            report.missing.len()
        );
    }
    Ok(())
}
