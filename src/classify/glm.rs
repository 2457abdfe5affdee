// file: src/classify/glm.rs
// description: GLM chat-completions client implementing the CompletionApi seam
// reference: https://open.bigmodel.cn/dev/api

use crate::classify::engine::CompletionApi;
use crate::config::AiConfig;
use crate::error::{PipelineError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SYSTEM_PROMPT: &str = "你是一个专业的GitHub项目分析助手，擅长对项目进行分类和生成摘要。";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

pub struct GlmClient {
    client: reqwest::Client,
    config: AiConfig,
    api_key: String,
}

impl GlmClient {
    /// Returns None when no API key is configured; the engine then runs on
    /// the keyword fallback alone.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            config: config.clone(),
            api_key,
        }))
    }
}

impl CompletionApi for GlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("Sending chat completion request ({} chars)", prompt.len());

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PipelineError::Authorization(format!(
                    "AI endpoint rejected the key ({status})"
                )));
            }
            _ => {
                // 429/5xx surface as transient reqwest status errors
                return Err(match response.error_for_status() {
                    Err(e) => PipelineError::Http(e),
                    Ok(resp) => PipelineError::MalformedResponse(format!(
                        "unexpected status {} from AI endpoint",
                        resp.status()
                    )),
                });
            }
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::MalformedResponse(format!("chat completion: {e}")))?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                PipelineError::MalformedResponse("chat completion reply had no choices".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_api_key_yields_no_client() {
        let mut config = crate::config::Config::default_config().ai;
        config.api_key = None;
        assert!(GlmClient::from_config(&config).unwrap().is_none());

        config.api_key = Some("   ".to_string());
        assert!(GlmClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_request_serializes_messages_in_order() {
        let request = ChatRequest {
            model: "glm-4.5-flash".to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: "分析这个项目".to_string(),
                },
            ],
            temperature: 0.5,
            max_tokens: 300,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["model"], "glm-4.5-flash");
    }

    #[test]
    fn test_response_content_extraction() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"category\": \"其他\"}"}}]}"#;
        let reply: ChatResponse = serde_json::from_str(json).unwrap();
        let content = reply.choices.into_iter().next().unwrap().message.content;
        assert_eq!(content, "{\"category\": \"其他\"}");
    }
}
