use anyhow::Context;
use formport_core::config::FileConfig;
use formport_core::{io, paths};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing formport in: {}", root.display());

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        FileConfig::default()
            .save(root)
            .context("failed to write formport.json")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    // Scaffold the directories the config points at. An existing config
    // may name non-default roots; honour it.
    let cfg = FileConfig::load(root).context("failed to load formport.json")?;
    for dir in [&cfg.source_root, &cfg.output_root] {
        let path = root.join(dir);
        if path.is_dir() {
            println!("  exists:  {}/", dir.display());
        } else {
            io::ensure_dir(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            println!("  created: {}/", dir.display());
        }
    }

    println!("\nformport initialized.");
    println!("Next: formport run --entity <Name>   (or: formport run --form-name <frmName>)");
    Ok(())
}
