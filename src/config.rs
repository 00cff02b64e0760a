//! Application configuration module
//!
//! Layered settings: built-in defaults, then the optional project-local
//! `.charter.json`, then `CHARTER__SECTION__KEY` environment overrides.

use crate::error::{AppError, AppResult};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use validator::Validate;

/// Project-local configuration file name
pub const CONFIG_FILE: &str = ".charter.json";

pub const DEFAULT_SCHEMA: &str = ".charter/schema.json";
pub const DEFAULT_LEDGER: &str = ".charter/versions.json";
pub const DEFAULT_CONSTITUTION: &str = "PROTOCOL.md";
pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;

/// Validation configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ValidationConfig {
    pub schema: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
    /// External validator executable, used when `tools.validator` is custom or plugin
    pub validator: Option<PathBuf>,
    #[validate(range(min = 0.0, max = 100.0, message = "Pass threshold must be between 0 and 100"))]
    pub pass_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema: None,
            ledger: None,
            validator: None,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

/// Operating-protocol document the policy audits inspect
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ConstitutionConfig {
    #[validate(length(min = 1, message = "Constitution source is required"))]
    pub source: String,
}

impl Default for ConstitutionConfig {
    fn default() -> Self {
        Self {
            source: DEFAULT_CONSTITUTION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Default,
    Custom,
    Plugin,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    #[serde(rename = "type")]
    pub kind: ToolKind,
    pub command: Option<String>,
}

/// Complete application settings
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    #[validate(nested)]
    pub validation: ValidationConfig,
    #[validate(nested)]
    pub constitution: ConstitutionConfig,
    /// Free-form values surfaced by `status`
    pub standards: BTreeMap<String, serde_json::Value>,
    pub tools: BTreeMap<String, ToolConfig>,
    /// Extra executables added to the process allow-list
    pub plugins: Vec<String>,
}

/// Where a store should read from, and whether the path was asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePath {
    pub path: PathBuf,
    pub explicit: bool,
}

impl Settings {
    /// Load settings for `project`; `file` overrides the project-local config
    pub fn load(project: &Path, file: Option<&Path>) -> AppResult<Self> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let source = match file {
            Some(path) if !path.is_file() => {
                return Err(AppError::Config(format!("config file {} not found", path.display())));
            }
            Some(path) => File::from(path).format(FileFormat::Json).required(true),
            None => File::from(project.join(CONFIG_FILE))
                .format(FileFormat::Json)
                .required(false),
        };

        let settings: Settings = Config::builder()
            .set_default("validation.pass_threshold", DEFAULT_PASS_THRESHOLD)?
            .set_default("constitution.source", DEFAULT_CONSTITUTION)?
            .add_source(source)
            .add_source(
                Environment::with_prefix("CHARTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!("Loaded settings for {}", project.display());
        Ok(settings)
    }

    pub fn schema_path(&self, project: &Path) -> StorePath {
        resolve(project, self.validation.schema.as_deref(), DEFAULT_SCHEMA)
    }

    pub fn ledger_path(&self, project: &Path) -> StorePath {
        resolve(project, self.validation.ledger.as_deref(), DEFAULT_LEDGER)
    }

    pub fn tool(&self, name: &str) -> ToolConfig {
        self.tools.get(name).cloned().unwrap_or_default()
    }

    /// External validator executable, if the project swapped out the built-in one
    pub fn external_validator(&self) -> Option<PathBuf> {
        let tool = self.tool("validator");
        match tool.kind {
            ToolKind::Default => None,
            ToolKind::Custom | ToolKind::Plugin => tool
                .command
                .map(PathBuf::from)
                .or_else(|| self.validation.validator.clone()),
        }
    }
}

fn resolve(project: &Path, configured: Option<&Path>, default: &str) -> StorePath {
    match configured {
        Some(path) if path.is_absolute() => StorePath {
            path: path.to_path_buf(),
            explicit: true,
        },
        Some(path) => StorePath {
            path: project.join(path),
            explicit: true,
        },
        None => StorePath {
            path: project.join(default),
            explicit: false,
        },
    }
}
