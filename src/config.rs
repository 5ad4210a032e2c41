//! 运行配置：默认值 → YAML 文件 → 环境变量 → 命令行参数。
//!
//! Bridge configuration.
//!
//! Layering, lowest precedence first: built-in defaults, an optional YAML file,
//! `BRIDGE_*` environment variables, then command-line flags (applied by the
//! binary).

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, ErrorContext, Result};

/// How tools are presented to the upstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMode {
    /// Native when the model family supports it, prompt-based otherwise.
    #[default]
    Auto,
    /// Native only; models without native support are rejected.
    Native,
    /// Always use the `<tool_call>` prompt protocol.
    Prompt,
}

impl std::str::FromStr for ToolMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ToolMode::Auto),
            "native" => Ok(ToolMode::Native),
            "prompt" => Ok(ToolMode::Prompt),
            other => Err(Error::configuration_with_context(
                format!("Unknown tool mode: '{}'", other),
                ErrorContext::new()
                    .with_field_path("tool_mode")
                    .with_details("expected auto, native or prompt"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: String,
    pub port: u16,
    /// Upstream `user` when the client sends no bearer token.
    pub default_user: String,
    pub default_model: String,
    pub default_temperature: f64,
    pub tool_mode: ToolMode,
    /// Probe upstream URLs at startup (never fatal).
    pub check_connection: bool,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7285,
            default_user: "bridge".to_string(),
            default_model: "gpt4o".to_string(),
            default_temperature: 0.1,
            tool_mode: ToolMode::Auto,
            check_connection: true,
            upstream: UpstreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub prod_chat_url: String,
    pub prod_embed_url: String,
    pub dev_chat_url: String,
    pub dev_embed_url: String,
    /// Incremental streaming endpoint.
    pub stream_url: String,
    pub timeout_secs: u64,
    pub embed_batch_size: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            prod_chat_url: "https://gateway.example.com/api/v1/resource/chat/".to_string(),
            prod_embed_url: "https://gateway.example.com/api/v1/resource/embed/".to_string(),
            dev_chat_url: "https://gateway-dev.example.com/api/v1/resource/chat/".to_string(),
            dev_embed_url: "https://gateway-dev.example.com/api/v1/resource/embed/".to_string(),
            stream_url: "https://gateway-dev.example.com/api/v1/resource/streamchat/".to_string(),
            timeout_secs: 300,
            embed_batch_size: 16,
        }
    }
}

impl UpstreamConfig {
    /// Every configured endpoint, labelled, for the startup probe.
    pub fn endpoints(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("prod chat", self.prod_chat_url.as_str()),
            ("prod embed", self.prod_embed_url.as_str()),
            ("dev chat", self.dev_chat_url.as_str()),
            ("dev embed", self.dev_embed_url.as_str()),
            ("stream", self.stream_url.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub console_level: String,
    /// Optional log file; console only when unset.
    pub file: Option<String>,
    pub file_level: Option<String>,
    /// Raise console and file output to debug.
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_level: "warn".to_string(),
            file: None,
            file_level: None,
            verbose: false,
        }
    }
}

impl LoggingConfig {
    pub fn effective_console_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.console_level
        }
    }

    pub fn effective_file_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            self.file_level.as_deref().unwrap_or(&self.level)
        }
    }
}

impl BridgeConfig {
    /// Load defaults, then the YAML file if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Overlay `BRIDGE_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| env::var(key).ok())
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = get("BRIDGE_HOST") {
            self.host = v;
        }
        if let Some(v) = get("BRIDGE_PORT") {
            self.port = v.parse().map_err(|_| invalid_env("BRIDGE_PORT", &v))?;
        }
        if let Some(v) = get("BRIDGE_USER") {
            self.default_user = v;
        }
        if let Some(v) = get("BRIDGE_DEFAULT_MODEL") {
            self.default_model = v;
        }
        if let Some(v) = get("BRIDGE_TOOL_MODE") {
            self.tool_mode = v.parse()?;
        }
        if let Some(v) = get("BRIDGE_TIMEOUT_SECS") {
            self.upstream.timeout_secs =
                v.parse().map_err(|_| invalid_env("BRIDGE_TIMEOUT_SECS", &v))?;
        }
        if let Some(v) = get("BRIDGE_STREAM_URL") {
            self.upstream.stream_url = v;
        }
        if let Some(v) = get("BRIDGE_LOG_LEVEL") {
            self.logging.level = v.to_lowercase();
        }
        if let Some(v) = get("BRIDGE_CONSOLE_LOG_LEVEL") {
            self.logging.console_level = v.to_lowercase();
        }
        if let Some(v) = get("BRIDGE_FILE_LOG_LEVEL") {
            self.logging.file_level = Some(v.to_lowercase());
        }
        if let Some(v) = get("BRIDGE_LOG_FILE") {
            self.logging.file = Some(v);
        }
        if let Some(v) = get("BRIDGE_VERBOSE") {
            self.logging.verbose = v.eq_ignore_ascii_case("true") || v == "1";
        }
        Ok(())
    }

    /// Reject unusable upstream URLs and zero-sized knobs.
    pub fn validate(&self) -> Result<()> {
        for (label, raw) in self.upstream.endpoints() {
            let parsed = url::Url::parse(raw).map_err(|e| {
                Error::configuration_with_context(
                    format!("Invalid {} URL '{}': {}", label, raw, e),
                    ErrorContext::new()
                        .with_field_path("upstream")
                        .with_source("config_loader"),
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::configuration_with_context(
                    format!("{} URL must be http(s): '{}'", label, raw),
                    ErrorContext::new()
                        .with_field_path("upstream")
                        .with_source("config_loader"),
                ));
            }
        }
        if self.upstream.embed_batch_size == 0 {
            return Err(Error::configuration_with_context(
                "embed_batch_size must be at least 1",
                ErrorContext::new()
                    .with_field_path("upstream.embed_batch_size")
                    .with_source("config_loader"),
            ));
        }
        Ok(())
    }
}

fn invalid_env(key: &str, value: &str) -> Error {
    Error::configuration_with_context(
        format!("Invalid value for {}: '{}'", key, value),
        ErrorContext::new()
            .with_field_path(key)
            .with_source("config_loader"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.port, 7285);
        assert_eq!(cfg.tool_mode, ToolMode::Auto);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = BridgeConfig::from_yaml_str(
            "port: 9000\ntool_mode: prompt\nupstream:\n  timeout_secs: 12\n",
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.tool_mode, ToolMode::Prompt);
        assert_eq!(cfg.upstream.timeout_secs, 12);
        assert_eq!(cfg.upstream.embed_batch_size, 16);
        assert_eq!(cfg.default_user, "bridge");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BRIDGE_PORT", "8080"),
            ("BRIDGE_TOOL_MODE", "native"),
            ("BRIDGE_VERBOSE", "true"),
        ]);
        let mut cfg = BridgeConfig::default();
        cfg.apply_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.tool_mode, ToolMode::Native);
        assert_eq!(cfg.logging.effective_console_level(), "debug");
        assert_eq!(cfg.logging.effective_file_level(), "debug");
    }

    #[test]
    fn test_bad_env_port_is_configuration_error() {
        let mut cfg = BridgeConfig::default();
        let err = cfg
            .apply_vars(|k| (k == "BRIDGE_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_invalid_upstream_url_rejected() {
        let mut cfg = BridgeConfig::default();
        cfg.upstream.stream_url = "ftp://example.com/stream".into();
        assert!(cfg.validate().is_err());
        cfg.upstream.stream_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_file_level_falls_back_to_level() {
        let logging = LoggingConfig {
            level: "trace".into(),
            ..Default::default()
        };
        assert_eq!(logging.effective_file_level(), "trace");
        assert_eq!(logging.effective_console_level(), "warn");
    }
}
