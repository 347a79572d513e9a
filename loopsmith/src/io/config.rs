//! Agent configuration stored under `.loopsmith/config.toml`.
//!
//! The file holds everything except secrets. The API key and a few
//! deployment knobs come from the environment, read once at start-up.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::process::CommandLimits;

/// Which endpoint is tried first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hosted OpenAI-compatible API first, alternate endpoint as fallback.
    Openai,
    /// Alternate (usually local) endpoint first, hosted API as fallback.
    Alternate,
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::Openai),
            "alternate" | "local" => Ok(ProviderKind::Alternate),
            other => Err(anyhow!("unknown provider '{other}' (expected openai|alternate)")),
        }
    }
}

/// Agent configuration (TOML).
///
/// Missing fields default to working values, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Model identifier sent with every request.
    pub model: String,

    pub provider: ProviderKind,

    /// Base URL of the hosted API (`/chat/completions` is appended).
    pub openai_base_url: String,

    /// Base URL of the alternate endpoint.
    pub alternate_base_url: String,

    /// Whether the alternate endpoint accepts the inline `memory` parameter.
    pub alternate_supports_inline_memory: bool,

    /// Whether the hosted endpoint accepts the inline `memory` parameter.
    pub openai_supports_inline_memory: bool,

    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,

    /// Short connect/response timeout for the alternate endpoint, so the
    /// fallback engages quickly when it is down.
    pub alternate_timeout_secs: u64,

    /// Seconds to sleep between scheduler ticks.
    pub loop_interval_secs: f64,

    /// Reference fragments retrieved per step prompt.
    pub retrieval_top_k: usize,

    /// Directory scanned for reference documents (relative to the root).
    pub reference_dir: PathBuf,

    pub command_timeout_secs: u64,
    pub command_output_limit_bytes: usize,

    pub tests: CommandConfig,
    pub lint: CommandConfig,

    /// API key. Never written to disk; filled from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandConfig {
    /// Argv to execute (e.g. `["cargo","test"]`).
    pub command: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            provider: ProviderKind::Openai,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            alternate_base_url: "http://localhost:11434/v1".to_string(),
            alternate_supports_inline_memory: false,
            openai_supports_inline_memory: false,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
            alternate_timeout_secs: 5,
            loop_interval_secs: 10.0,
            retrieval_top_k: 3,
            reference_dir: PathBuf::from("."),
            command_timeout_secs: 10 * 60,
            command_output_limit_bytes: 100_000,
            tests: CommandConfig {
                command: vec!["cargo".to_string(), "test".to_string()],
            },
            lint: CommandConfig {
                command: vec!["cargo".to_string(), "clippy".to_string()],
            },
            api_key: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(anyhow!("provider timeouts must be > 0"));
        }
        if self.alternate_timeout_secs == 0 {
            return Err(anyhow!("alternate_timeout_secs must be > 0"));
        }
        if !(self.loop_interval_secs.is_finite() && self.loop_interval_secs >= 0.0) {
            return Err(anyhow!("loop_interval_secs must be a non-negative number"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.command_output_limit_bytes == 0 {
            return Err(anyhow!("command_output_limit_bytes must be > 0"));
        }
        for (label, cmd) in [("tests", &self.tests), ("lint", &self.lint)] {
            if cmd.command.is_empty() || cmd.command[0].trim().is_empty() {
                return Err(anyhow!("{label}.command must be a non-empty array"));
            }
        }
        Ok(())
    }

    /// Timeout and output bounds for spawned commands.
    pub fn command_limits(&self) -> CommandLimits {
        CommandLimits {
            timeout: Duration::from_secs(self.command_timeout_secs),
            output_limit_bytes: self.command_output_limit_bytes,
        }
    }

    /// Apply environment overrides through a lookup function.
    ///
    /// Recognized: `OPENAI_API_KEY`, `LOOPSMITH_MODEL`, `LOOPSMITH_PROVIDER`,
    /// `LOOPSMITH_ALTERNATE_URL`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty("LOOPSMITH_MODEL") {
            self.model = model;
        }
        if let Some(provider) = non_empty("LOOPSMITH_PROVIDER") {
            self.provider = provider.parse()?;
        }
        if let Some(url) = non_empty("LOOPSMITH_ALTERNATE_URL") {
            self.alternate_base_url = url;
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    debug!(path = %path.display(), model = %cfg.model, provider = ?cfg.provider, "config loaded");
    Ok(cfg)
}

/// Load config from disk, then apply process environment overrides.
pub fn load_config_with_env(path: &Path) -> Result<AgentConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = AgentConfig {
            provider: ProviderKind::Alternate,
            retrieval_top_k: 5,
            ..AgentConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "model = \"local-model\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.model, "local-model");
        assert_eq!(cfg.retrieval_top_k, 3);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("LOOPSMITH_PROVIDER", "alternate"),
            ("LOOPSMITH_MODEL", ""),
        ]);
        let mut cfg = AgentConfig::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()))
            .expect("apply env");
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cfg.provider, ProviderKind::Alternate);
        assert_eq!(cfg.model, "gpt-4o-mini");
    }

    #[test]
    fn invalid_provider_in_env_is_rejected() {
        let mut cfg = AgentConfig::default();
        let err = cfg
            .apply_env(|key| (key == "LOOPSMITH_PROVIDER").then(|| "bogus".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("unknown provider"));
    }

    #[test]
    fn api_key_is_never_serialized() {
        let cfg = AgentConfig {
            api_key: Some("sk-secret".to_string()),
            ..AgentConfig::default()
        };
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        assert!(!text.contains("sk-secret"));
    }
}
