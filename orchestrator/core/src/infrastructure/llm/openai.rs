// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! OpenAI / OpenAI-compatible Adapter
//!
//! Implements the `LLMProvider` domain trait for OpenAI `gpt-*` models and
//! any OpenAI-compatible endpoint (LM Studio, vLLM, etc.). Anti-Corruption
//! Layer: translates the domain's (system_prompt, history, tools) contract
//! into Chat Completions `tools`/`tool_calls` payloads and back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{Message, MessageRole};
use crate::domain::llm::{GenerationResult, LLMError, LLMProvider, GENERATION_DEADLINE_SECS};
use crate::domain::tool::{ToolCall, ToolDescriptor};

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
}

#[derive(Serialize, Deserialize, Clone)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAIFunction,
}

#[derive(Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: crate::domain::tool::ToolInputSchema,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Deserialize)]
struct OpenAIToolCall {
    function: OpenAIToolCallFunction,
}

#[derive(Deserialize)]
struct OpenAIToolCallFunction {
    name: String,
    arguments: String,
}

impl OpenAIAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

fn to_openai_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn status_to_error(status: reqwest::StatusCode, body: String, model: &str) -> LLMError {
    match status.as_u16() {
        401 | 403 => LLMError::Authentication(body),
        429 => LLMError::RateLimit,
        404 => LLMError::ModelNotFound(model.to_string()),
        code => LLMError::Provider {
            status: code,
            message: body,
        },
    }
}

#[async_trait]
impl LLMProvider for OpenAIAdapter {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError> {
        let mut messages = vec![OpenAIMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        }];
        messages.extend(history.iter().map(|m| OpenAIMessage {
            role: to_openai_role(m.role).to_string(),
            content: m.content.clone(),
        }));

        let request = OpenAIRequest {
            model: self.model.clone(),
            messages,
            tools: tools
                .iter()
                .map(|t| OpenAITool {
                    kind: "function",
                    function: OpenAIFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    },
                })
                .collect(),
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(GENERATION_DEADLINE_SECS),
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| LLMError::Timeout(GENERATION_DEADLINE_SECS))?
        .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status, body, &self.model));
        }

        let parsed: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Protocol(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Protocol("no choices in response".to_string()))?;

        if let Some(call) = choice.message.tool_calls.into_iter().next() {
            let arguments: serde_json::Value =
                serde_json::from_str(&call.function.arguments)
                    .map_err(|e| LLMError::Protocol(format!("malformed tool arguments: {e}")))?;
            return Ok(GenerationResult::ToolCall(ToolCall {
                name: call.function.name,
                arguments,
            }));
        }

        Ok(GenerationResult::Text(choice.message.content.unwrap_or_default()))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            Err(LLMError::Authentication("invalid API key".to_string()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_message_roles() {
        assert_eq!(to_openai_role(MessageRole::System), "system");
        assert_eq!(to_openai_role(MessageRole::Tool), "tool");
    }

    #[test]
    fn deserializes_tool_call_response() {
        let json = serde_json::json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "function": { "name": "resources_list", "arguments": "{}" }
                    }]
                }
            }]
        });
        let response: OpenAIResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.choices[0].message.tool_calls.len(), 1);
        assert_eq!(response.choices[0].message.tool_calls[0].function.name, "resources_list");
    }

    #[test]
    fn deserializes_text_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "content": "hello", "tool_calls": [] } }]
        });
        let response: OpenAIResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("hello"));
    }
}
