//! Provider router: selects the LLM provider and model for a request.
//!
//! A request may carry a `model` override:
//! - `provider:model` (e.g. `openai:gpt-4.1`) picks both explicitly
//! - a bare provider name (`openai`) picks that provider's configured model
//! - anything else is a model id for the default provider

use std::collections::HashMap;
use std::sync::Arc;

use pengate_core::error::ProviderError;
use pengate_core::provider::Provider;
use tracing::debug;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::{OPENAI_BASE_URL, OpenAiCompatProvider};

/// A provider paired with the model id to request from it.
#[derive(Clone)]
pub struct ResolvedModel {
    pub provider: Arc<dyn Provider>,
    pub provider_name: String,
    pub model: String,
}

impl std::fmt::Debug for ResolvedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedModel")
            .field("provider", &self.provider_name)
            .field("model", &self.model)
            .finish()
    }
}

impl ResolvedModel {
    /// `provider:model`, as recorded in session logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.provider_name, self.model)
    }
}

struct Entry {
    provider: Arc<dyn Provider>,
    default_model: String,
}

/// Routes LLM requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Entry>,
    /// Every provider name the router may be asked for, registered or not.
    known: Vec<String>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            known: Vec::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider together with the model used when none is named.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        default_model: impl Into<String>,
    ) {
        let name = name.into();
        self.mark_known(&name);
        self.providers.insert(
            name,
            Entry {
                provider,
                default_model: default_model.into(),
            },
        );
    }

    /// Record a provider name that exists but has no credentials.
    pub fn mark_known(&mut self, name: &str) {
        if !self.known.iter().any(|k| k == name) {
            self.known.push(name.to_string());
        }
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    fn pick(&self, name: &str, model: Option<&str>) -> Result<ResolvedModel, ProviderError> {
        let entry = self.providers.get(name).ok_or_else(|| {
            ProviderError::NotConfigured(format!("provider '{name}' has no API key configured"))
        })?;
        Ok(ResolvedModel {
            provider: entry.provider.clone(),
            provider_name: name.to_string(),
            model: model.unwrap_or(&entry.default_model).to_string(),
        })
    }

    /// Resolve an optional model override to a provider and model id.
    pub fn resolve(&self, model_override: Option<&str>) -> Result<ResolvedModel, ProviderError> {
        let resolved = match model_override.map(str::trim).filter(|s| !s.is_empty()) {
            None => self.pick(&self.default_provider, None),
            Some(spec) => match spec.split_once(':') {
                Some((provider, model)) if self.is_known(provider) => {
                    let model = Some(model).filter(|m| !m.is_empty());
                    self.pick(provider, model)
                }
                _ if self.is_known(spec) => self.pick(spec, None),
                _ => self.pick(&self.default_provider, Some(spec)),
            },
        }?;
        debug!(provider = %resolved.provider_name, model = %resolved.model, "Resolved model");
        Ok(resolved)
    }

    fn is_known(&self, name: &str) -> bool {
        self.known.iter().any(|k| k == name)
    }

    /// List all registered (usable) provider names.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration. Providers without an API key are
/// known but unusable; resolving them yields `NotConfigured`.
pub fn build_from_config(config: &pengate_config::AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    let anthropic = &config.providers.anthropic;
    match &anthropic.api_key {
        Some(key) => {
            let mut p = AnthropicProvider::new(key);
            if let Some(url) = &anthropic.api_url {
                p = p.with_base_url(url);
            }
            router.register("anthropic", Arc::new(p), &anthropic.model);
        }
        None => router.mark_known("anthropic"),
    }

    let openai = &config.providers.openai;
    match &openai.api_key {
        Some(key) => {
            let url = openai.api_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            let p = OpenAiCompatProvider::new("openai", url, key);
            router.register("openai", Arc::new(p), &openai.model);
        }
        None => router.mark_known("openai"),
    }

    router
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ProviderRouter {
        let mut config = pengate_config::AppConfig::default();
        config.providers.anthropic.api_key = Some("sk-ant".into());
        config.providers.openai.api_key = Some("sk-oai".into());
        build_from_config(&config)
    }

    #[test]
    fn no_override_uses_default_provider_and_model() {
        let r = router().resolve(None).unwrap();
        assert_eq!(r.provider_name, "anthropic");
        assert_eq!(r.model, "claude-sonnet-4-20250514");
        assert_eq!(r.label(), "anthropic:claude-sonnet-4-20250514");
    }

    #[test]
    fn bare_provider_name_selects_its_default_model() {
        let r = router().resolve(Some("openai")).unwrap();
        assert_eq!(r.provider_name, "openai");
        assert_eq!(r.model, "gpt-4o");
    }

    #[test]
    fn provider_prefixed_model() {
        let r = router().resolve(Some("openai:gpt-4.1-mini")).unwrap();
        assert_eq!(r.provider_name, "openai");
        assert_eq!(r.model, "gpt-4.1-mini");
    }

    #[test]
    fn bare_model_goes_to_default_provider() {
        let r = router().resolve(Some("claude-opus-4-20250514")).unwrap();
        assert_eq!(r.provider_name, "anthropic");
        assert_eq!(r.model, "claude-opus-4-20250514");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let router = build_from_config(&pengate_config::AppConfig::default());
        assert!(router.list().is_empty());
        let err = router.resolve(Some("openai")).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }
}
