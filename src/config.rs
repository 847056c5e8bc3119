use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classifier::confidence::ConfidenceThresholds;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_margin_confident")]
    pub margin_confident: f64,
    #[serde(default = "default_entropy_relative_max")]
    pub entropy_relative_max: f64,
    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,
    #[serde(default = "default_escalation_candidates")]
    pub escalation_candidates: usize,
    #[serde(default)]
    pub force_escalation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gateway_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enable_log: bool,
    #[serde(default = "default_true")]
    pub persist: bool,
    #[serde(default)]
    pub webhook: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub gateway_endpoint: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/ticket-triage/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(endpoint) = overrides.gateway_endpoint {
            self.gateway.endpoint = endpoint;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn thresholds(&self) -> ConfidenceThresholds {
        ConfidenceThresholds {
            margin_confident: self.classifier.margin_confident,
            entropy_relative_max: self.classifier.entropy_relative_max,
            min_text_chars: self.classifier.min_text_chars,
        }
    }

    pub fn default_template() -> String {
        let template = r#"[classifier]
margin_confident = 2.0
entropy_relative_max = 0.7
min_text_chars = 12
escalation_candidates = 3
force_escalation = false

[gateway]
endpoint = ""
api_key = ""
timeout_secs = 12
connect_timeout_secs = 6

[storage]
db_path = "~/.local/share/ticket-triage/triage.db"

[audit]
enable_log = true
persist = true
webhook = ""
"#;
        template.to_string()
    }
}

impl GatewayConfig {
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn api_key_opt(&self) -> Option<String> {
        let key = self.api_key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_string())
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            margin_confident: default_margin_confident(),
            entropy_relative_max: default_entropy_relative_max(),
            min_text_chars: default_min_text_chars(),
            escalation_candidates: default_escalation_candidates(),
            force_escalation: false,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_gateway_timeout_secs(),
            connect_timeout_secs: default_gateway_connect_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enable_log: true,
            persist: true,
            webhook: String::new(),
        }
    }
}

fn default_margin_confident() -> f64 {
    2.0
}

fn default_entropy_relative_max() -> f64 {
    0.7
}

fn default_min_text_chars() -> usize {
    12
}

fn default_escalation_candidates() -> usize {
    3
}

fn default_gateway_timeout_secs() -> u64 {
    12
}

fn default_gateway_connect_timeout_secs() -> u64 {
    6
}

fn default_db_path() -> String {
    "~/.local/share/ticket-triage/triage.db".to_string()
}

fn default_true() -> bool {
    true
}
