use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_LIMIT, LengthRange, SearchConstraints};
use crate::error::KiraError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-taxseq.json";
pub const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub entrez: EntrezSettings,
    #[serde(default)]
    pub defaults: SearchDefaults,
}

/// Where and how the E-utilities are reached.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntrezSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for EntrezSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            database: default_database(),
            tool: default_tool(),
            email: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchDefaults {
    #[serde(default)]
    pub seq_range: LengthRange,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub get_related: bool,
    #[serde(default)]
    pub hypothetical: bool,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            seq_range: LengthRange::default(),
            limit: default_limit(),
            get_related: false,
            hypothetical: false,
            workers: default_workers(),
            filter: None,
        }
    }
}

impl SearchDefaults {
    pub fn constraints(&self) -> SearchConstraints {
        SearchConstraints {
            seq_range: self.seq_range,
            max_records: self.limit,
            filter: self.filter.clone(),
            keep_hypothetical: self.hypothetical,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kira-taxseq.json` in the current directory when no
    /// path is given. Only an explicitly named file is required to exist.
    pub fn resolve(path: Option<&str>) -> Result<Config, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
            Self::parse(&content)?
        };

        if let Ok(api_key) = std::env::var("NCBI_API_KEY") {
            if !api_key.trim().is_empty() {
                config.entrez.api_key = Some(api_key.trim().to_string());
            }
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Config, KiraError> {
        serde_json::from_str(content).map_err(|err| KiraError::ConfigParse(err.to_string()))
    }
}

fn default_base_url() -> String {
    EUTILS_BASE.to_string()
}

fn default_database() -> String {
    "nuccore".to_string()
}

fn default_tool() -> String {
    "kira-taxseq".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> usize {
    3
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

fn default_workers() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_config() {
        let config = ConfigLoader::parse(
            r#"{"entrez": {"email": "lab@example.org"}, "defaults": {"seq_range": "100:900"}}"#,
        )
        .unwrap();
        assert_eq!(config.entrez.database, "nuccore");
        assert_eq!(config.entrez.email.as_deref(), Some("lab@example.org"));
        assert_eq!(config.defaults.limit, 500);
        assert_eq!(config.defaults.seq_range.to_string(), "100:900");
        assert!(!config.defaults.hypothetical);
    }
}
