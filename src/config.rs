use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::params::RagParams;
use crate::sanitize::MAX_QUERY_CHARS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub params: RagParams,
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
    #[serde(default)]
    pub eval: EvalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:9621".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SanitizerConfig {
    #[serde(default)]
    pub extra_patterns: Vec<String>,
    #[serde(default)]
    pub extra_separators: Vec<String>,
    #[serde(default = "default_max_len")]
    pub max_len: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            extra_patterns: Vec::new(),
            extra_separators: Vec::new(),
            max_len: default_max_len(),
        }
    }
}

fn default_max_len() -> usize {
    MAX_QUERY_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvalConfig {
    #[serde(default = "default_faithfulness")]
    pub min_faithfulness: f64,
    #[serde(default = "default_answer_relevance")]
    pub min_answer_relevance: f64,
    #[serde(default)]
    pub dataset: Option<PathBuf>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            min_faithfulness: default_faithfulness(),
            min_answer_relevance: default_answer_relevance(),
            dataset: None,
        }
    }
}

fn default_faithfulness() -> f64 {
    0.7
}
fn default_answer_relevance() -> f64 {
    0.8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Configuration used when no config file is present: local backend,
    /// built-in sanitizer rules, default thresholds.
    pub fn minimal() -> Self {
        Self {
            backend: BackendConfig::default(),
            params: RagParams::default(),
            sanitizer: SanitizerConfig::default(),
            eval: EvalConfig::default(),
            server: ServerConfig::default(),
            log: LogConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let url = config.backend.base_url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("backend.base_url must start with http:// or https://");
    }
    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    if config.sanitizer.max_len == 0 {
        anyhow::bail!("sanitizer.max_len must be > 0");
    }

    for (name, value) in [
        ("eval.min_faithfulness", config.eval.min_faithfulness),
        ("eval.min_answer_relevance", config.eval.min_answer_relevance),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("{} must be in [0.0, 1.0]", name);
        }
    }

    config
        .params
        .validate()
        .with_context(|| "Invalid [params] section")?;

    crate::logger::parse_level(&config.log.level)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(body: &str) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ragdesk.toml");
        fs::write(&path, body).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_defaults_applied() {
        let (_tmp, path) = write_config("[backend]\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.backend.base_url, "http://localhost:9621");
        assert_eq!(cfg.sanitizer.max_len, 500);
        assert_eq!(cfg.eval.min_faithfulness, 0.7);
        assert_eq!(cfg.eval.min_answer_relevance, 0.8);
        assert_eq!(cfg.params.chunk_top_k, 20);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_backend_section_optional() {
        let (_tmp, path) = write_config("[sanitizer]\nextra_separators = [\"<|im_start|>\"]\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.backend.base_url, "http://localhost:9621");
        assert_eq!(cfg.backend.timeout_secs, 60);
        assert!(cfg.backend.token.is_none());
        assert_eq!(cfg.sanitizer.extra_separators, vec!["<|im_start|>"]);
    }

    #[test]
    fn test_empty_file_is_minimal() {
        let (_tmp, path) = write_config("");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.bind, Config::minimal().server.bind);
        assert_eq!(cfg.params, RagParams::default());
    }

    #[test]
    fn test_full_config() {
        let (_tmp, path) = write_config(
            r#"
[backend]
base_url = "https://rag.internal:9621"
api_key = "k-123"
timeout_secs = 5

[params]
temperature = 0.2
top_k = 60
chunk_top_k = 8
system_prompt = "Answer briefly."

[sanitizer]
extra_patterns = ["reveal\\s+your\\s+prompt[\\s\\S]*"]
extra_separators = ["<|im_start|>"]
max_len = 300

[eval]
min_faithfulness = 0.6
dataset = "eval/EVAL.jsonl"

[server]
bind = "0.0.0.0:8000"

[log]
level = "debug"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.backend.api_key.as_deref(), Some("k-123"));
        assert_eq!(cfg.params.temperature, 0.2);
        assert_eq!(cfg.params.chunk_top_k, 8);
        assert_eq!(cfg.sanitizer.extra_separators, vec!["<|im_start|>"]);
        assert_eq!(cfg.sanitizer.max_len, 300);
        assert_eq!(cfg.eval.min_faithfulness, 0.6);
        assert_eq!(cfg.eval.min_answer_relevance, 0.8);
        assert_eq!(cfg.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_rejects_bad_url() {
        let (_tmp, path) = write_config("[backend]\nbase_url = \"localhost:9621\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_rejects_threshold_out_of_range() {
        let (_tmp, path) = write_config("[backend]\n[eval]\nmin_answer_relevance = 1.5\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("min_answer_relevance"));
    }

    #[test]
    fn test_rejects_bad_params() {
        let (_tmp, path) = write_config("[backend]\n[params]\nchunk_top_k = 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let (_tmp, path) = write_config("[backend]\n[log]\nlevel = \"loud\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/ragdesk.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
