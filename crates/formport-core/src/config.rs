use crate::error::Result;
use crate::io;
use crate::paths;
use crate::types::{ConflictStrategy, MergeMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Which generation backend the pipeline calls.
///
/// `claude_cli` drives the Claude CLI through the `claude-gen` crate;
/// `command` runs an arbitrary argv with the prompt on stdin and stdout as
/// the generation, which is what the integration tests use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    ClaudeCli {
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
        #[serde(default)]
        executable: Option<String>,
        #[serde(default)]
        max_turns: Option<u32>,
    },
    Command {
        argv: Vec<String>,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
    },
}

fn default_model() -> String {
    "claude-sonnet-4-6".to_string()
}

fn default_timeout_seconds() -> u64 {
    600
}

fn default_backend() -> BackendConfig {
    BackendConfig::ClaudeCli {
        model: default_model(),
        timeout_seconds: default_timeout_seconds(),
        executable: None,
        max_turns: None,
    }
}

impl BackendConfig {
    pub fn timeout_seconds(&self) -> u64 {
        match self {
            BackendConfig::ClaudeCli { timeout_seconds, .. } => *timeout_seconds,
            BackendConfig::Command { timeout_seconds, .. } => *timeout_seconds,
        }
    }
}

// ---------------------------------------------------------------------------
// FileConfig (formport.json)
// ---------------------------------------------------------------------------

/// The optional project config document at `{root}/formport.json`.
/// Every field has a default; an absent file means "all defaults".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Where the legacy VB sources live, relative to the project root.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Where per-entity pipeline output lands.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Target project roots for deployment and merge.
    #[serde(default = "default_api_root")]
    pub api_root: PathBuf,
    #[serde(default = "default_ui_root")]
    pub ui_root: PathBuf,
    #[serde(default = "default_shared_root")]
    pub shared_root: PathBuf,
    #[serde(default = "default_backend")]
    pub backend: BackendConfig,
    /// Default merge mode when the flag is absent.
    #[serde(default)]
    pub mode: MergeMode,
    /// Default conflict strategy when the flag is absent.
    #[serde(default)]
    pub conflict_strategy: ConflictStrategy,
}

fn default_version() -> u32 {
    1
}

fn default_source_root() -> PathBuf {
    PathBuf::from("legacy")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

fn default_api_root() -> PathBuf {
    PathBuf::from("api")
}

fn default_ui_root() -> PathBuf {
    PathBuf::from("ui")
}

fn default_shared_root() -> PathBuf {
    PathBuf::from("shared")
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            source_root: default_source_root(),
            output_root: default_output_root(),
            api_root: default_api_root(),
            ui_root: default_ui_root(),
            shared_root: default_shared_root(),
            backend: default_backend(),
            mode: MergeMode::default(),
            conflict_strategy: ConflictStrategy::default(),
        }
    }
}

impl FileConfig {
    /// Load `{root}/formport.json`, or defaults when the file is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load an explicit config file path (`--config`). The file must exist
    /// when named explicitly.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(crate::error::ConvertError::Usage(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: FileConfig = serde_json::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        io::atomic_write(&path, data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// FlagOverrides / RunConfig
// ---------------------------------------------------------------------------

/// CLI-flag layer applied over [`FileConfig`]. Flags win wherever both
/// specify a value.
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub output_root: Option<PathBuf>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub mode: Option<MergeMode>,
    pub conflict_strategy: Option<ConflictStrategy>,
}

/// Immutable resolved options for one invocation. Built once, read
/// everywhere; all paths are absolute (joined onto the project root).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub entity: String,
    pub form_name: Option<String>,
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub api_root: PathBuf,
    pub ui_root: PathBuf,
    pub shared_root: PathBuf,
    pub backend: BackendConfig,
    pub mode: MergeMode,
    pub conflict_strategy: ConflictStrategy,
}

impl RunConfig {
    pub fn resolve(
        root: &Path,
        cfg: &FileConfig,
        entity: &str,
        overrides: &FlagOverrides,
    ) -> Result<Self> {
        paths::validate_entity(entity)?;

        let mut backend = cfg.backend.clone();
        if let BackendConfig::ClaudeCli {
            model,
            timeout_seconds,
            ..
        } = &mut backend
        {
            if let Some(m) = &overrides.model {
                *model = m.clone();
            }
            if let Some(t) = overrides.timeout_seconds {
                *timeout_seconds = t;
            }
        } else if let BackendConfig::Command {
            timeout_seconds, ..
        } = &mut backend
        {
            if let Some(t) = overrides.timeout_seconds {
                *timeout_seconds = t;
            }
        }

        let output_root = overrides
            .output_root
            .clone()
            .unwrap_or_else(|| cfg.output_root.clone());

        Ok(Self {
            entity: entity.to_string(),
            form_name: None,
            source_root: root.join(&cfg.source_root),
            output_root: root.join(output_root),
            api_root: root.join(&cfg.api_root),
            ui_root: root.join(&cfg.ui_root),
            shared_root: root.join(&cfg.shared_root),
            backend,
            mode: overrides.mode.unwrap_or(cfg.mode),
            conflict_strategy: overrides
                .conflict_strategy
                .unwrap_or(cfg.conflict_strategy),
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // auto mode cannot prompt, so a prompt strategy is a contradiction
        if self.mode == MergeMode::Auto && self.conflict_strategy == ConflictStrategy::Prompt {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "auto mode requires a non-interactive conflict strategy \
                          (use keep-existing or use-generated)"
                    .to_string(),
            });
        }

        if self.backend.timeout_seconds() < 30 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "backend timeout of {}s is unusually small; generations routinely \
                     take longer",
                    self.backend.timeout_seconds()
                ),
            });
        }

        match &self.backend {
            BackendConfig::ClaudeCli { executable, .. } => {
                let exe = executable.as_deref().unwrap_or("claude");
                if which::which(exe).is_err() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!("claude executable '{exe}' not found in PATH"),
                    });
                }
            }
            BackendConfig::Command { argv, .. } => {
                if argv.is_empty() {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: "command backend has an empty argv".to_string(),
                    });
                }
            }
        }

        warnings
    }

    /// True when validation produced at least one hard error.
    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
