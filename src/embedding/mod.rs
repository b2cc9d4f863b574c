//! 임베딩 모듈 - OpenAI API를 통한 텍스트 벡터화
//!
//! 텍스트를 고정 길이 벡터로 변환하는 OpenAI 임베딩 프로바이더입니다.
//! 잉제스트와 쿼리 양쪽에서 같은 모델을 사용해야 유사도 비교가 의미를 가집니다.
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = OpenAiEmbedding::from_env(&config)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    ///
    /// 잉제스트는 패시지별 실패 허용을 위해 레코드 하나씩 호출합니다.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 모델 식별자
    ///
    /// 컬렉션 메타데이터에 기록되어 쿼리 시 모델 일치 검증에 사용됩니다.
    fn model_id(&self) -> &str;
}

// ============================================================================
// OpenAI Embedding
// ============================================================================

/// API 키 환경변수 이름
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// 잉제스트 경로의 기본 재시도 횟수 (429/전송 에러)
pub const DEFAULT_INGEST_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// OpenAI 임베딩 구현체
///
/// 기본값은 재시도 없음입니다 - 쿼리 경로는 에러를 즉시 전파합니다.
/// 실패 허용인 잉제스트 경로만 `with_retries`로 재시도를 켭니다.
///
/// ref: https://platform.openai.com/docs/api-reference/embeddings
#[derive(Debug)]
pub struct OpenAiEmbedding {
    api_key: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    max_retries: u32,
}

impl OpenAiEmbedding {
    /// 새 OpenAI 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API 키
    /// * `base_url` - OpenAI 호환 API base URL
    /// * `model` - 임베딩 모델 식별자
    /// * `dimension` - 임베딩 차원
    pub fn new(api_key: String, base_url: &str, model: String, dimension: usize) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "Empty API key");
        anyhow::ensure!(dimension > 0, "Embedding dimension must be positive");

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        Ok(Self {
            api_key,
            client,
            endpoint,
            model,
            dimension,
            max_retries: 0,
        })
    }

    /// 429/전송 에러 재시도 횟수 설정 (잉제스트 경로용)
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 환경변수에서 API 키를 읽어 설정 기반으로 생성 (재시도 없음)
    pub fn from_env(config: &Config) -> Result<Self> {
        let api_key = get_api_key()?;
        Self::new(
            api_key,
            &config.base_url,
            config.embedding_model.clone(),
            config.embedding_dimension,
        )
    }
}

/// OpenAI embeddings 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

/// OpenAI embeddings 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// OpenAI API 에러 응답
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    r#type: String,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // text-embedding-3 계열만 dimensions 파라미터를 지원
        let request = EmbedRequest {
            model: &self.model,
            input: text,
            dimensions: self
                .model
                .starts_with("text-embedding-3")
                .then_some(self.dimension),
        };

        let mut last_error: Option<anyhow::Error> = None;

        // max_retries가 0이면 한 번만 시도하고 즉시 전파 (쿼리 경로)
        for attempt in 0..=self.max_retries {
            let response = match self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < self.max_retries {
                        let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            self.max_retries
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            // 성공
            if status.is_success() {
                let embed_response: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                let embedding = embed_response
                    .data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| anyhow::anyhow!("Embedding response contained no data"))?;
                anyhow::ensure!(
                    embedding.len() == self.dimension,
                    "Embedding dimension mismatch: expected {}, got {}",
                    self.dimension,
                    embedding.len()
                );
                return Ok(embedding);
            }

            // 429 Rate Limit 에러 - 재시도
            if status.as_u16() == 429 {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    self.max_retries
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));

                if attempt < self.max_retries {
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                // 다른 에러 - 즉시 실패
                if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                    anyhow::bail!(
                        "OpenAI API error ({}): {}",
                        error.error.r#type,
                        error.error.message
                    );
                }
                anyhow::bail!("OpenAI API error ({}): {}", status, body);
            }
        }

        // 모든 재시도 실패
        Err(last_error
            .unwrap_or_else(|| {
                anyhow::anyhow!("Embedding failed after {} retries", self.max_retries)
            }))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (`OPENAI_API_KEY` 환경변수)
pub fn get_api_key() -> Result<String> {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            return Ok(key);
        }
    }

    anyhow::bail!(
        "API key not found. Set the {} environment variable.",
        API_KEY_ENV
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    std::env::var(API_KEY_ENV)
        .map(|key| !key.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
