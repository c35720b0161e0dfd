// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ollama Adapter
//!
//! Anti-Corruption Layer for local Ollama models. Ollama's `/api/chat`
//! has no native tool-calling contract for most local models, so tool
//! selection is emulated: the tool surface is serialized into the system
//! prompt and the model is asked to respond with a JSON object
//! `{"tool_call": {"name": ..., "arguments": {...}}}` when it wants to call
//! a tool, or plain text otherwise. Supports air-gapped deployments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{Message, MessageRole};
use crate::domain::llm::{GenerationResult, LLMError, LLMProvider, GENERATION_DEADLINE_SECS};
use crate::domain::tool::{ToolCall, ToolDescriptor};

pub struct OllamaAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize, Clone)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct EmulatedToolCall {
    tool_call: ToolCall,
}

impl OllamaAdapter {
    pub fn new(endpoint: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            model,
        }
    }
}

fn to_ollama_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

/// Build the tool-emulation preamble appended to the system prompt when
/// tools are available.
fn tool_emulation_preamble(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return String::new();
    }
    let descriptors = tools
        .iter()
        .map(|t| format!("- {} ({}): {}", t.name, t.input_schema.schema_type, t.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "\n\nYou have access to these tools:\n{descriptors}\n\n\
         To call a tool, respond with ONLY a JSON object of the exact shape \
         {{\"tool_call\": {{\"name\": \"<tool name>\", \"arguments\": {{...}}}}}} \
         and nothing else. Otherwise respond with plain text."
    )
}

#[async_trait]
impl LLMProvider for OllamaAdapter {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError> {
        let mut messages = vec![OllamaMessage {
            role: "system".to_string(),
            content: format!("{system_prompt}{}", tool_emulation_preamble(tools)),
        }];
        messages.extend(history.iter().map(|m| OllamaMessage {
            role: to_ollama_role(m.role).to_string(),
            content: m.content.clone(),
        }));

        let request = OllamaRequest {
            model: self.model.clone(),
            messages,
            stream: false,
        };

        let url = format!("{}/api/chat", self.endpoint.trim_end_matches('/'));

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(GENERATION_DEADLINE_SECS),
            self.client.post(&url).json(&request).send(),
        )
        .await
        .map_err(|_| LLMError::Timeout(GENERATION_DEADLINE_SECS))?
        .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(if status == reqwest::StatusCode::NOT_FOUND {
                LLMError::ModelNotFound(self.model.clone())
            } else {
                LLMError::Provider {
                    status: status.as_u16(),
                    message: body,
                }
            });
        }

        let parsed: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Protocol(e.to_string()))?;

        let content = parsed.message.content.trim();
        if let Ok(emulated) = serde_json::from_str::<EmulatedToolCall>(content) {
            return Ok(GenerationResult::ToolCall(emulated.tool_call));
        }

        Ok(GenerationResult::Text(parsed.message.content))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/api/tags", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}
