use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "CHANNEL_REVIEW_CONFIG";

const DEFAULT_USER_AGENT: &str = concat!("channel-review/", env!("CARGO_PKG_VERSION"));
const DEFAULT_HELP_URL: &str = "https://github.com/packagecontrol/st_package_reviewer/wiki/Package-checks";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub review: ReviewPolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrawlerConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
    /// Never read from the config file; populated from `--token`/`GITHUB_TOKEN`.
    #[serde(skip)]
    pub github_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEventPolicy {
    #[default]
    RequestChanges,
    ByVerdict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewPolicyConfig {
    #[serde(default = "default_help_url")]
    pub help_url: String,
    #[serde(default)]
    pub event: ReviewEventPolicy,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_max_download_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_max_entries() -> usize {
    20_000
}

fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_max_total_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_help_url() -> String {
    DEFAULT_HELP_URL.to_string()
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            github_api_base: default_github_api_base(),
            max_download_bytes: default_max_download_bytes(),
            github_token: None,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            max_file_bytes: default_max_file_bytes(),
            max_total_bytes: default_max_total_bytes(),
        }
    }
}

impl Default for ReviewPolicyConfig {
    fn default() -> Self {
        Self {
            help_url: default_help_url(),
            event: ReviewEventPolicy::default(),
        }
    }
}

impl ReviewConfig {
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Explicit path wins, then `CHANNEL_REVIEW_CONFIG`; with neither set the
    /// defaults apply.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid {
                section: "crawler",
                key: "user_agent",
                message: "must be non-empty".to_string(),
            });
        }
        if self.crawler.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                section: "crawler",
                key: "timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if !self.crawler.github_api_base.starts_with("https://") {
            return Err(ConfigError::Invalid {
                section: "crawler",
                key: "github_api_base",
                message: format!(
                    "must be an https:// URL, got {:?}",
                    self.crawler.github_api_base
                ),
            });
        }
        if self.extract.max_entries == 0 {
            return Err(ConfigError::Invalid {
                section: "extract",
                key: "max_entries",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.extract.max_file_bytes > self.extract.max_total_bytes {
            return Err(ConfigError::Invalid {
                section: "extract",
                key: "max_file_bytes",
                message: "must not exceed max_total_bytes".to_string(),
            });
        }
        Ok(())
    }
}
