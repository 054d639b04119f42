use crate::error::{ConvertError, Result};
use crate::paths;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Advisory per-entity lock guarding against two concurrent runs writing the
/// same manifest. Created with `create_new` so acquisition is atomic; the
/// file holds the owning pid. Released on drop.
///
/// A crash leaves the file behind; the error message names the pid inside so
/// the operator can verify the process is gone and delete the file.
#[derive(Debug)]
pub struct EntityLock {
    path: PathBuf,
}

impl EntityLock {
    pub fn acquire(output_root: &Path, entity: &str) -> Result<Self> {
        let path = paths::lock_path(output_root, entity);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                writeln!(f, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let pid = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(ConvertError::LockHeld {
                    entity: entity.to_string(),
                    pid,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for EntityLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
