// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Provider Registry — `provider:name` Resolution
//
// Resolves a `provider:name` model identifier (§4.1) to a constructed
// adapter. The registry is built once at startup from configuration and
// injected immutably thereafter (§9 "Global-ish state avoided").

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::config::{ProviderEntryConfig, ProviderKind};
use crate::domain::conversation::Message;
use crate::domain::llm::{GenerationResult, LLMError, LLMProvider};
use crate::domain::tool::ToolDescriptor;

use super::anthropic::AnthropicAdapter;
use super::ollama::OllamaAdapter;
use super::openai::OpenAIAdapter;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    pub fn from_config(entries: &[ProviderEntryConfig]) -> anyhow::Result<Self> {
        let mut providers = HashMap::new();

        for entry in entries {
            info!(provider = %entry.name, "initializing LLM provider");
            match Self::create_provider(entry) {
                Ok(provider) => {
                    providers.insert(entry.name.clone(), provider);
                }
                Err(e) => {
                    warn!(provider = %entry.name, error = %e, "failed to initialize provider");
                }
            }
        }

        Ok(Self { providers })
    }

    fn create_provider(entry: &ProviderEntryConfig) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = Self::resolve_api_key(&entry.api_key)?;
        let provider: Arc<dyn LLMProvider> = match entry.kind {
            ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(api_key, entry.model.clone())),
            ProviderKind::Openai => {
                let endpoint = entry
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
                Arc::new(OpenAIAdapter::new(endpoint, api_key, entry.model.clone()))
            }
            ProviderKind::Ollama => {
                let endpoint = entry
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());
                Arc::new(OllamaAdapter::new(endpoint, entry.model.clone()))
            }
        };
        Ok(provider)
    }

    /// Resolve an API key literal or `env:VAR_NAME` indirection.
    fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key {
            Some(k) if k.starts_with("env:") => {
                let var_name = k.strip_prefix("env:").unwrap();
                std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("environment variable not set: {var_name}"))
            }
            Some(k) => Ok(k.clone()),
            None => Ok(String::new()),
        }
    }

    /// Split a `provider:name` model identifier and resolve the `provider`
    /// half to a registered adapter.
    pub fn resolve(&self, model_identifier: &str) -> Result<&Arc<dyn LLMProvider>, LLMError> {
        let provider_key = model_identifier
            .split_once(':')
            .map(|(provider, _name)| provider)
            .unwrap_or(model_identifier);

        self.providers
            .get(provider_key)
            .ok_or_else(|| LLMError::ModelNotFound(model_identifier.to_string()))
    }

    pub async fn generate(
        &self,
        model_identifier: &str,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError> {
        let provider = self.resolve(model_identifier)?;
        provider.generate(system_prompt, history, tools).await
    }

    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();
        for (name, provider) in &self.providers {
            results.insert(name.clone(), provider.health_check().await);
        }
        results
    }
}

impl ProviderRegistry {
    /// Registers a single pre-built provider under `name`, bypassing config
    /// parsing and adapter construction. Used by tests and by embedders that
    /// construct their own `LLMProvider` rather than going through
    /// `from_config`.
    pub fn from_test_provider(name: &str, provider: Arc<dyn LLMProvider>) -> Self {
        let mut providers = HashMap::new();
        providers.insert(name.to_string(), provider);
        Self { providers }
    }
}
