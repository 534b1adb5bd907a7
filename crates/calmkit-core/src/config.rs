use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use calmkit_provider::ProviderConfig;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config/calmkit.yaml";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

fn default_user_id() -> String {
    "interactive_user".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_output_tokens() -> u32 {
    512
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_responder_temperature() -> f32 {
    0.7
}

fn default_history_window() -> usize {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataConfig {
    #[serde(default = "DataConfig::default_mood_log")]
    pub mood_log: PathBuf,
    #[serde(default = "DataConfig::default_techniques_dir")]
    pub techniques_dir: PathBuf,
}

impl DataConfig {
    fn default_mood_log() -> PathBuf {
        PathBuf::from("data/mood_log.json")
    }

    fn default_techniques_dir() -> PathBuf {
        PathBuf::from("data/techniques")
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            mood_log: Self::default_mood_log(),
            techniques_dir: Self::default_techniques_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Ask the model first; keyword matching is always the fallback.
    #[serde(default = "default_true")]
    pub use_llm: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            use_llm: true,
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponderConfig {
    #[serde(default)]
    pub use_llm: bool,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_responder_temperature")]
    pub temperature: f32,
    /// Number of entries considered for "how am I doing" requests.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            use_llm: false,
            model: default_model(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_responder_temperature(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalmkitConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for CalmkitConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            data: DataConfig::default(),
            classifier: ClassifierConfig::default(),
            responder: ResponderConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl CalmkitConfig {
    /// Whether any component wants a generative-model provider.
    pub fn wants_provider(&self) -> bool {
        self.classifier.use_llm || self.responder.use_llm
    }

    /// Data paths with relative entries resolved against `root`.
    pub fn resolved_data(&self, root: &Path) -> DataConfig {
        DataConfig {
            mood_log: resolve_path(root, &self.data.mood_log),
            techniques_dir: resolve_path(root, &self.data.techniques_dir),
        }
    }
}

fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `config/calmkit.yaml` under `root`, falling back to defaults when it is absent.
pub fn load_config(root: &Path) -> Result<CalmkitConfig> {
    let path = root.join(CONFIG_FILE);
    let mut config = if path.exists() {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        parse_config(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?
    } else {
        tracing::debug!("no config at {}, using defaults", path.display());
        CalmkitConfig::default()
    };

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<CalmkitConfig> {
    if content.trim().is_empty() {
        return Ok(CalmkitConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

fn resolve_config_env(config: &mut CalmkitConfig) {
    config.user_id = resolve_env_var(&config.user_id);
    if let Some(key) = config.provider.api_key.as_mut() {
        *key = resolve_env_var(key);
    }
    if let Some(url) = config.provider.base_url.as_mut() {
        *url = resolve_env_var(url);
    }
}

pub fn validate_config(config: &CalmkitConfig) -> Result<()> {
    if config.user_id.trim().is_empty() {
        return Err(anyhow!("user_id must not be empty"));
    }
    if config.classifier.max_output_tokens == 0 {
        return Err(anyhow!("classifier.max_output_tokens must be greater than 0"));
    }
    if config.responder.max_output_tokens == 0 {
        return Err(anyhow!("responder.max_output_tokens must be greater than 0"));
    }
    for (name, temperature) in [
        ("classifier", config.classifier.temperature),
        ("responder", config.responder.temperature),
    ] {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(anyhow!(
                "{name}.temperature must be within [0, 2], got {temperature}"
            ));
        }
    }
    if config.classifier.timeout_secs == 0 {
        return Err(anyhow!("classifier.timeout_secs must be greater than 0"));
    }
    Ok(())
}
