//! 생성 호출 - OpenAI 호환 ChatCompletion 클라이언트
//!
//! 조립된 프롬프트와 샘플링 파라미터를 외부 생성 서비스에 제출하고
//! 첫 번째 응답의 텍스트를 추출합니다. 쿼리 경로이므로 재시도/캐시 없이
//! 모든 에러를 그대로 전파합니다.
//!
//! ref: https://platform.openai.com/docs/api-reference/chat

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::embedding::get_api_key;

use super::prompt::ChatMessage;

// ============================================================================
// ChatModel Trait
// ============================================================================

/// 샘플링 파라미터 (해석하지 않고 생성 서비스에 그대로 전달)
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    /// Nucleus sampling 임계값
    pub top_p: f32,
    /// 샘플링 온도
    pub temperature: f32,
}

/// 텍스트 생성 모델 트레이트
///
/// 메시지 시퀀스를 받아 단일 응답 텍스트를 반환합니다.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 프롬프트 제출 후 응답 텍스트 반환 (앞뒤 공백 제거)
    async fn complete(&self, messages: &[ChatMessage], params: SamplingParams) -> Result<String>;
}

// ============================================================================
// OpenAI ChatCompletion
// ============================================================================

/// OpenAI ChatCompletion 구현체
pub struct OpenAiChatModel {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiChatModel {
    /// 새 ChatCompletion 클라이언트 생성
    pub fn new(api_key: String, base_url: &str, model: String) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "Empty API key");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));

        Ok(Self {
            api_key,
            client,
            endpoint,
            model,
        })
    }

    /// 환경변수에서 API 키를 읽어 설정 기반으로 생성
    pub fn from_env(config: &Config) -> Result<Self> {
        let api_key = get_api_key()?;
        Self::new(api_key, &config.base_url, config.generation_model.clone())
    }
}

/// ChatCompletion 요청 본문
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
}

/// ChatCompletion 응답
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, messages: &[ChatMessage], params: SamplingParams) -> Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            top_p: params.top_p,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call chat completions")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            anyhow::bail!("Chat completion failed ({}): {}", status, body);
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completion returned no choices"))?;

        Ok(reply.trim().to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
