//! 模型注册表：模型别名、上游环境与响应格式族的静态映射
//!
//! Static model registry. Maps client-facing aliases to upstream model ids,
//! upstream ids to their deployment environment, and upstream ids to the
//! [`ModelFamily`] whose tool-calling schema they speak. All tables are
//! read-only after first access.

use std::collections::{HashMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::UpstreamConfig;
use crate::types::openai::{ModelList, ModelObject};
use crate::{Error, ErrorContext, Result};

/// Response-schema family of an upstream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    OpenAi,
    Anthropic,
    Google,
    /// No native tool calling; tools are emulated with the `<tool_call>` text protocol.
    PromptBased,
}

impl ModelFamily {
    pub fn supports_native_tools(self) -> bool {
        !matches!(self, ModelFamily::PromptBased)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::OpenAi => "openai",
            ModelFamily::Anthropic => "anthropic",
            ModelFamily::Google => "google",
            ModelFamily::PromptBased => "prompt_based",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream deployment an upstream model lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamEnv {
    Prod,
    Dev,
}

/// Client alias -> upstream model id.
static CHAT_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("gpt35", "gpt35"),
        ("gpt-3.5", "gpt35"),
        ("gpt35large", "gpt35large"),
        ("gpt4", "gpt4"),
        ("gpt-4", "gpt4"),
        ("gpt4large", "gpt4large"),
        ("gpt4turbo", "gpt4turbo"),
        ("gpt-4-turbo", "gpt4turbo"),
        ("gpt-4o", "gpt4o"),
        ("gpt4o", "gpt4o"),
        ("gpt-4o-mini", "gpt4o"),
        ("gpt4olatest", "gpt4olatest"),
        ("gpt-4o-latest", "gpt4olatest"),
        ("gpto1preview", "gpto1preview"),
        ("o1-preview", "gpto1preview"),
        ("o1-mini", "gpto1mini"),
        ("gpto1mini", "gpto1mini"),
        ("o1mini", "gpto1mini"),
        ("o3-mini", "gpto3mini"),
        ("o3mini", "gpto3mini"),
        ("gpto3mini", "gpto3mini"),
        ("gpto4mini", "gpto4mini"),
        ("o4-mini", "gpto4mini"),
        ("gpto1", "gpto1"),
        ("o1", "gpto1"),
        ("o3", "gpto3"),
        ("gpto3", "gpto3"),
        ("gpt41", "gpt41"),
        ("gpt41mini", "gpt41mini"),
        ("gpt41nano", "gpt41nano"),
        ("gemini25pro", "gemini25pro"),
        ("gemini25flash", "gemini25flash"),
        ("claudeopus4", "claudeopus4"),
        ("claudesonnet4", "claudesonnet4"),
        ("claudesonnet37", "claudesonnet37"),
        ("claudesonnet35v2", "claudesonnet35v2"),
    ])
});

/// Upstream chat model id -> environment. Unlisted ids go to prod.
static MODEL_ENV: Lazy<HashMap<&'static str, UpstreamEnv>> = Lazy::new(|| {
    use UpstreamEnv::{Dev, Prod};
    HashMap::from([
        ("gpt35", Prod),
        ("gpt35large", Prod),
        ("gpt4", Prod),
        ("gpt4large", Prod),
        ("gpt4turbo", Prod),
        ("gpt4o", Prod),
        ("gpt4olatest", Prod),
        ("gpto1preview", Prod),
        ("gpto3mini", Dev),
        ("gpto1mini", Dev),
        ("gpto1", Dev),
        ("gpto3", Dev),
        ("gpto4mini", Dev),
        ("gpt41", Dev),
        ("gpt41mini", Dev),
        ("gpt41nano", Dev),
        ("gemini25pro", Dev),
        ("gemini25flash", Dev),
        ("claudeopus4", Dev),
        ("claudesonnet4", Dev),
        ("claudesonnet37", Dev),
        ("claudesonnet35v2", Dev),
    ])
});

/// Upstream ids without native tool calling even though they are OpenAI models.
static PROMPT_ONLY_MODELS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["gpto1preview", "gpto1mini"]));

/// Upstream ids that cannot stream incrementally; streaming requests are emulated.
static NON_STREAMING_MODELS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "gemini25pro",
        "gemini25flash",
        "claudeopus4",
        "claudesonnet4",
        "claudesonnet37",
        "claudesonnet35v2",
        "gpto3",
        "gpto4mini",
        "gpt41",
        "gpt41mini",
        "gpt41nano",
    ])
});

static EMBEDDING_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("text-embedding-3-small", "v3small"),
        ("v3small", "v3small"),
        ("text-embedding-3-large", "v3large"),
        ("v3large", "v3large"),
        ("text-embedding-ada-002", "ada002"),
        ("ada002", "ada002"),
    ])
});

/// Resolve an upstream model id to its response-schema family.
///
/// Total: ids that are not known to speak a native schema resolve to
/// [`ModelFamily::PromptBased`].
pub fn resolve(model_id: &str) -> ModelFamily {
    if PROMPT_ONLY_MODELS.contains(model_id) {
        return ModelFamily::PromptBased;
    }
    if !MODEL_ENV.contains_key(model_id) {
        return ModelFamily::PromptBased;
    }
    if model_id.starts_with("claude") {
        ModelFamily::Anthropic
    } else if model_id.starts_with("gemini") {
        ModelFamily::Google
    } else if model_id.starts_with("gpt") {
        ModelFamily::OpenAi
    } else {
        ModelFamily::PromptBased
    }
}

/// Map a client alias to the upstream chat model id.
pub fn lookup_chat_model(alias: &str) -> Result<&'static str> {
    CHAT_ALIASES.get(alias).copied().ok_or_else(|| {
        Error::validation_with_context(
            format!("Model '{}' not supported.", alias),
            ErrorContext::new()
                .with_field_path("request.model")
                .with_source("model_registry"),
        )
    })
}

/// Map a client alias to the upstream embedding model id.
pub fn lookup_embedding_model(alias: &str) -> Result<&'static str> {
    EMBEDDING_ALIASES.get(alias).copied().ok_or_else(|| {
        Error::validation_with_context(
            format!("Embedding model '{}' not supported.", alias),
            ErrorContext::new()
                .with_field_path("request.model")
                .with_source("model_registry"),
        )
    })
}

pub fn upstream_env(model_id: &str) -> UpstreamEnv {
    MODEL_ENV.get(model_id).copied().unwrap_or(UpstreamEnv::Prod)
}

/// Whether the upstream can stream this model token by token.
pub fn supports_streaming(model_id: &str) -> bool {
    !NON_STREAMING_MODELS.contains(model_id)
}

pub fn is_google_model(model_id: &str) -> bool {
    resolve(model_id) == ModelFamily::Google
}

pub fn chat_url<'a>(cfg: &'a UpstreamConfig, model_id: &str) -> &'a str {
    match upstream_env(model_id) {
        UpstreamEnv::Prod => &cfg.prod_chat_url,
        UpstreamEnv::Dev => &cfg.dev_chat_url,
    }
}

/// Embeddings always go to the production deployment.
pub fn embed_url(cfg: &UpstreamConfig) -> &str {
    &cfg.prod_embed_url
}

/// The `/v1/models` listing: every upstream chat model id.
pub fn models_list(created: i64) -> ModelList {
    let mut ids: Vec<&str> = MODEL_ENV.keys().copied().collect();
    ids.sort_unstable();
    ModelList {
        object: "list".to_string(),
        data: ids
            .into_iter()
            .map(|id| ModelObject {
                id: id.to_string(),
                object: "model".to_string(),
                created,
                owned_by: "system".to_string(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_resolution() {
        assert_eq!(resolve("gpt4o"), ModelFamily::OpenAi);
        assert_eq!(resolve("gpto3"), ModelFamily::OpenAi);
        assert_eq!(resolve("claudesonnet35v2"), ModelFamily::Anthropic);
        assert_eq!(resolve("gemini25flash"), ModelFamily::Google);
        assert_eq!(resolve("gpto1preview"), ModelFamily::PromptBased);
    }

    #[test]
    fn test_unknown_model_is_prompt_based() {
        assert_eq!(resolve("llama-70b"), ModelFamily::PromptBased);
        assert_eq!(resolve(""), ModelFamily::PromptBased);
        assert_eq!(resolve("gpt-unknown"), ModelFamily::PromptBased);
    }

    #[test]
    fn test_alias_lookup() {
        assert_eq!(lookup_chat_model("gpt-4o").unwrap(), "gpt4o");
        assert_eq!(lookup_chat_model("o4-mini").unwrap(), "gpto4mini");
        let err = lookup_chat_model("gpt-9").unwrap_err();
        assert_eq!(err.message(), "Model 'gpt-9' not supported.");
        assert_eq!(lookup_embedding_model("text-embedding-3-small").unwrap(), "v3small");
        assert!(lookup_embedding_model("bert").is_err());
    }

    #[test]
    fn test_every_alias_targets_a_routed_model() {
        for target in CHAT_ALIASES.values() {
            assert!(MODEL_ENV.contains_key(target), "{} has no environment", target);
        }
    }

    #[test]
    fn test_streaming_support_and_env() {
        assert!(supports_streaming("gpt4o"));
        assert!(!supports_streaming("claudesonnet4"));
        assert_eq!(upstream_env("gpt4o"), UpstreamEnv::Prod);
        assert_eq!(upstream_env("gemini25pro"), UpstreamEnv::Dev);
        assert_eq!(upstream_env("unlisted"), UpstreamEnv::Prod);
    }

    #[test]
    fn test_models_list_is_sorted_and_complete() {
        let list = models_list(0);
        assert_eq!(list.object, "list");
        assert_eq!(list.data.len(), MODEL_ENV.len());
        let ids: Vec<_> = list.data.iter().map(|m| m.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }
}
