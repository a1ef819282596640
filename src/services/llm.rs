//! 语言模型推理客户端
//! 通过 HTTP 调用 llama.cpp 兼容的推理服务，并提供测验生成提示词

use crate::error::QuizError;
use crate::services::assistant::ChatModel;
use crate::services::session::QuizTextGenerator;
use anyhow::{Context, Error, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 推理服务配置
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub question_count: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            request_timeout_secs: 120,
            question_count: 15,
        }
    }
}

/// 推理请求
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop_tokens: Vec<String>,
}

/// 推理响应
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    pub text: String,
    pub inference_time_ms: u64,
}

/// 聊天消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 聊天消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Completion 请求
#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    n_predict: u32,
    temperature: f32,
    stop: Vec<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_prompt: Option<bool>,
}

/// Completion 响应
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// 推理客户端
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// 健康检查
    pub async fn is_healthy(&self) -> bool {
        match self.http_client.get(self.endpoint("health")).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// 推理补全
    pub async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse> {
        let start_time = std::time::Instant::now();

        let completion_request = CompletionRequest {
            prompt: request.prompt,
            n_predict: request.max_tokens,
            temperature: request.temperature,
            stop: request.stop_tokens,
            stream: false,
            cache_prompt: Some(true),
        };

        let response = self
            .http_client
            .post(self.endpoint("completion"))
            .json(&completion_request)
            .send()
            .await
            .context("Failed to send completion request")?
            .error_for_status()
            .context("Inference server returned an error")?
            .json::<CompletionResponse>()
            .await
            .context("Failed to decode completion response")?;

        let inference_time_ms = start_time.elapsed().as_millis() as u64;
        debug!(
            "Completion returned {} chars in {} ms",
            response.content.len(),
            inference_time_ms
        );

        Ok(InferenceResponse {
            text: response.content,
            inference_time_ms,
        })
    }

    /// 聊天补全
    pub async fn chat_complete(&self, messages: &[ChatMessage]) -> Result<InferenceResponse> {
        let prompt = build_chat_prompt(messages);

        self.complete(InferenceRequest {
            prompt,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stop_tokens: vec!["<|im_end|>".to_string(), "</s>".to_string()],
        })
        .await
    }
}

impl QuizTextGenerator for LlmClient {
    async fn generate_quiz_text(&self, subject: &str) -> crate::error::Result<String> {
        info!("Requesting quiz text for '{}'", subject);
        let messages = [
            ChatMessage::system(QuizPrompt::SYSTEM),
            ChatMessage::user(QuizPrompt::generate_quiz(subject, self.config.question_count)),
        ];

        let response = self
            .chat_complete(&messages)
            .await
            .map_err(|e: Error| QuizError::Generation(format!("{:#}", e)))?;

        if response.text.trim().is_empty() {
            return Err(QuizError::Generation("model returned no text".to_string()));
        }
        Ok(response.text)
    }
}

impl ChatModel for LlmClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.chat_complete(messages).await?;
        Ok(response.text)
    }
}

/// 构建 ChatML 提示词
pub fn build_chat_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();

    for message in messages {
        let role = match message.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        prompt.push_str(&format!(
            "<|im_start|>{}\n{}\n<|im_end|>\n",
            role, message.content
        ));
    }

    prompt.push_str("<|im_start|>assistant\n");
    prompt
}

/// 测验生成提示词
pub struct QuizPrompt;

impl QuizPrompt {
    pub const SYSTEM: &'static str =
        "You are a quiz master for B.Sc. Computer Science students. Follow the requested format exactly.";

    pub fn generate_quiz(subject: &str, question_count: u32) -> String {
        format!(
            r#"Create a {count}-question multiple-choice quiz about '{subject}' based on the syllabus.
For each question, provide exactly three options, formatted like this:
A) Option A
B) Option B
C) Option C

Number every question like "1. Question text".

After all {count} questions, provide a separate answer key section that looks exactly like this, including the header:
Answer Key:
1. A, 2. C, 3. B, etc.

Ensure the output is clean and follows this structure precisely."#,
            count = question_count,
            subject = subject
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_chat_prompt() {
        let prompt = build_chat_prompt(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ]);

        assert_eq!(
            prompt,
            "<|im_start|>system\nbe brief\n<|im_end|>\n<|im_start|>user\nhello\n<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn test_quiz_prompt_mentions_format() {
        let prompt = QuizPrompt::generate_quiz("Data Structures", 15);

        assert!(prompt.contains("15-question"));
        assert!(prompt.contains("'Data Structures'"));
        assert!(prompt.contains("Answer Key:"));
        assert!(prompt.contains("C) Option C"));
    }

    #[test]
    fn test_completion_request_shape() {
        let request = CompletionRequest {
            prompt: "p".to_string(),
            n_predict: 10,
            temperature: 0.5,
            stop: vec![],
            stream: false,
            cache_prompt: None,
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["n_predict"], 10);
        assert!(json.get("cache_prompt").is_none());
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = LlmClient::new(LlmConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.endpoint("health"), "http://localhost:9000/health");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_generation_failure() {
        let client = LlmClient::new(LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        })
        .unwrap();

        let err = client.generate_quiz_text("Compilers").await.unwrap_err();
        assert!(err.is_generation_failure());
        assert!(!client.is_healthy().await);
    }
}
