use crate::core::query_builder::DEFAULT_FILTER_TIMEOUT_SECONDS;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{GeoError, Result};
use crate::utils::validation::{validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SPARQL_ENDPOINT: &str = "https://dbpedia.org/sparql";
pub const DEFAULT_OVERPASS_ENDPOINT: &str = "http://overpass-api.de/api/";
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 90;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub providers: ProvidersConfig,
    pub timeouts: TimeoutConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub sparql_endpoint: Option<String>,
    pub overpass_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overpass `[timeout:N]` directive
    pub query_seconds: Option<u64>,
    /// 用戶端等待每個請求的上限
    pub request_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(GeoError::Io)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| GeoError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OVERPASS_URL})，未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| GeoError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn json_logs(&self) -> bool {
        self.logging.as_ref().and_then(|l| l.json).unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn graph_endpoint(&self) -> &str {
        self.providers
            .sparql_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_SPARQL_ENDPOINT)
    }

    fn filter_endpoint(&self) -> &str {
        self.providers
            .overpass_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_OVERPASS_ENDPOINT)
    }

    fn query_timeout_seconds(&self) -> u64 {
        self.timeouts
            .query_seconds
            .unwrap_or(DEFAULT_FILTER_TIMEOUT_SECONDS)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeouts
                .request_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        )
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validate_url("providers.sparql_endpoint", self.graph_endpoint())?;
        validate_url("providers.overpass_endpoint", self.filter_endpoint())?;
        validate_range("timeouts.query_seconds", self.query_timeout_seconds(), 1, 3600)?;
        validate_range(
            "timeouts.request_seconds",
            self.request_timeout().as_secs(),
            1,
            3600,
        )?;
        Ok(())
    }
}
