use crate::error::Result;
use crate::paths;
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
// ModelConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Environment variable holding the API key. The key itself is never
    /// written to the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model_name() -> String {
    "claude-sonnet-4-6".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model_name(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ---------------------------------------------------------------------------
// InvestigationLimits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestigationLimits {
    /// Reasoning/tool round-trips before the run stops as incomplete.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Wall-clock budget for one investigation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound applied to `top_k` on every search tool call.
    #[serde(default = "default_max_top_k")]
    pub max_top_k: u32,
}

fn default_max_turns() -> u32 {
    25
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_max_top_k() -> u32 {
    20
}

impl Default for InvestigationLimits {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            timeout_secs: default_timeout_secs(),
            max_top_k: default_max_top_k(),
        }
    }
}

// ---------------------------------------------------------------------------
// IndexConfig / RepositoryConfig / DatabaseConfig
// ---------------------------------------------------------------------------

/// Connection details for a nearest-neighbor search service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Local checkout that `fetch_file` reads from. Defaults to the project root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkout: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DB_FILE)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub investigation: InvestigationLimits,
    #[serde(default)]
    pub code_index: IndexConfig,
    #[serde(default)]
    pub document_index: IndexConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            model: ModelConfig::default(),
            investigation: InvestigationLimits::default(),
            code_index: IndexConfig::default(),
            document_index: IndexConfig::default(),
            repository: RepositoryConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load `.crashlens/config.yaml`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn database_path(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.database.path)
    }

    pub fn checkout_path(&self, root: &Path) -> PathBuf {
        match &self.repository.checkout {
            Some(p) => paths::resolve(root, p),
            None => root.to_path_buf(),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.model.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "model.name is empty".to_string(),
            });
        }

        if self.model.provider != "anthropic" {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "model.provider '{}' is not supported (expected 'anthropic')",
                    self.model.provider
                ),
            });
        }

        if self.investigation.max_turns == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "investigation.max_turns=0: no investigation can make progress"
                    .to_string(),
            });
        }

        if self.investigation.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "investigation.timeout_secs=0: every investigation times out immediately"
                    .to_string(),
            });
        }

        if self.investigation.max_top_k == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "investigation.max_top_k=0: searches cannot return results".to_string(),
            });
        } else if self.investigation.max_top_k > 50 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "investigation.max_top_k={}: >50 results per search will bloat the transcript",
                    self.investigation.max_top_k
                ),
            });
        }

        if self.code_index.endpoint.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "code_index.endpoint is not set: search_code will report the index as unavailable"
                    .to_string(),
            });
        }

        warnings
    }
}
