// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic LLM Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API: translates the
// domain's (system_prompt, history, tools) contract into native `tool_use`
// blocks and back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::conversation::{Message, MessageRole};
use crate::domain::llm::{GenerationResult, LLMError, LLMProvider, GENERATION_DEADLINE_SECS};
use crate::domain::tool::{ToolCall, ToolDescriptor};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    system: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: crate::domain::tool::ToolInputSchema,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text { text: String },
    ToolUse { name: String, input: serde_json::Value },
}

fn to_anthropic_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Assistant | MessageRole::Tool => "assistant",
        MessageRole::System => "user",
    }
}

/// A response can carry a leading `text` block (e.g. reasoning) followed by
/// a `tool_use` block; tool_call takes precedence over text whenever both
/// are present (§4.1), so scan every block for the first `tool_use` before
/// falling back to the first `text`.
fn generation_result_from_blocks(blocks: Vec<AnthropicContentBlock>) -> GenerationResult {
    let mut first_text = None;
    for block in blocks {
        match block {
            AnthropicContentBlock::ToolUse { name, input } => {
                return GenerationResult::ToolCall(ToolCall {
                    name,
                    arguments: input,
                });
            }
            AnthropicContentBlock::Text { text } => {
                if first_text.is_none() {
                    first_text = Some(text);
                }
            }
        }
    }
    GenerationResult::Text(first_text.unwrap_or_default())
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
impl LLMProvider for AnthropicAdapter {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<GenerationResult, LLMError> {
        let messages = history
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(|m| AnthropicMessage {
                role: to_anthropic_role(m.role).to_string(),
                content: m.content.clone(),
            })
            .collect();

        let request = AnthropicRequest {
            model: self.model.clone(),
            system: system_prompt.to_string(),
            messages,
            max_tokens: 4096,
            tools: tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    input_schema: t.input_schema.clone(),
                })
                .collect(),
        };

        let response = tokio::time::timeout(
            std::time::Duration::from_secs(GENERATION_DEADLINE_SECS),
            self.client
                .post(ANTHROPIC_API_BASE)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
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

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Protocol(e.to_string()))?;

        Ok(generation_result_from_blocks(parsed.content))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let response = self
            .client
            .get(ANTHROPIC_API_BASE)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        // GET isn't supported on this endpoint; 404/405 with a valid key
        // still means auth succeeded.
        if response.status().is_success()
            || response.status() == reqwest::StatusCode::NOT_FOUND
            || response.status() == reqwest::StatusCode::METHOD_NOT_ALLOWED
        {
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
    fn tool_use_after_text_still_yields_a_tool_call() {
        let blocks = vec![
            AnthropicContentBlock::Text {
                text: "let me check that".to_string(),
            },
            AnthropicContentBlock::ToolUse {
                name: "resources_add".to_string(),
                input: serde_json::json!({ "name": "X" }),
            },
        ];
        let result = generation_result_from_blocks(blocks);
        match result {
            GenerationResult::ToolCall(call) => assert_eq!(call.name, "resources_add"),
            GenerationResult::Text(_) => panic!("expected a tool call, got text"),
        }
    }

    #[test]
    fn text_only_response_yields_text() {
        let blocks = vec![AnthropicContentBlock::Text {
            text: "done".to_string(),
        }];
        let result = generation_result_from_blocks(blocks);
        assert!(matches!(result, GenerationResult::Text(text) if text == "done"));
    }

    #[test]
    fn empty_content_yields_empty_text() {
        let result = generation_result_from_blocks(vec![]);
        assert!(matches!(result, GenerationResult::Text(text) if text.is_empty()));
    }
}
