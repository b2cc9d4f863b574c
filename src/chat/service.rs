//! Chat Service - 검색 → 프롬프트 조립 → 생성 파이프라인
//!
//! 임베더/스토어/생성 모델을 프로세스 시작 시 한 번 생성해서 주입받는
//! 명시적 컨텍스트 객체입니다. 지연 초기화 전역 상태가 없으므로
//! 첫 요청 경합 문제도 없습니다.
//!
//! 에러 정책: 쿼리 경로의 모든 에러(임베딩, 검색, 생성)는 복구하지 않고
//! `?`로 요청 경계까지 전파합니다. 부분 성공은 없습니다 - 요청은 응답
//! 하나로 성공하거나 전체가 실패합니다.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, OpenAiEmbedding};
use crate::knowledge::{LanceVectorStore, VectorStore};

use super::generate::{ChatModel, OpenAiChatModel, SamplingParams};
use super::prompt::{build_prompt, Turn};

// ============================================================================
// ChatService
// ============================================================================

/// RAG 챗 파이프라인
pub struct ChatService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    model: Arc<dyn ChatModel>,
    sampling: SamplingParams,
    top_k: usize,
}

impl ChatService {
    /// 주입된 컴포넌트로 생성 (테스트에서 스텁 주입용)
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn ChatModel>,
        sampling: SamplingParams,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            model,
            sampling,
            top_k,
        }
    }

    /// 설정 기반으로 실제 컴포넌트를 열어 생성
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = OpenAiEmbedding::from_env(config).context("Failed to create embedder")?;

        let store = LanceVectorStore::open(
            &config.store_path(),
            &config.collection,
            config.embedding_dimension,
        )
        .await
        .context("Failed to open vector store")?;

        let model = OpenAiChatModel::from_env(config).context("Failed to create chat model")?;

        Ok(Self::new(
            Arc::new(embedder),
            Arc::new(store),
            Arc::new(model),
            SamplingParams {
                top_p: config.top_p,
                temperature: config.temperature,
            },
            config.top_k,
        ))
    }

    /// 쿼리와 가장 유사한 패시지 k건의 원문 반환 (유사도 내림차순)
    ///
    /// 잉제스트와 같은 임베딩 모델인지 먼저 검증하고, 빈 질의도
    /// 그대로 임베더에 넘깁니다. 최소 유사도 문턱은 없습니다.
    pub async fn retrieve_context(&self, query: &str, k: usize) -> Result<Vec<String>> {
        self.store.verify_model(self.embedder.model_id()).await?;

        let embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed query")?;

        let results = self
            .store
            .search(&embedding, k)
            .await
            .context("Failed to search collection")?;

        tracing::debug!("Retrieved {} passages for query: {:?}", results.len(), query);

        Ok(results.into_iter().map(|p| p.document).collect())
    }

    /// 히스토리와 새 질문으로 응답 생성
    pub async fn respond(&self, history: &[Turn], query: &str) -> Result<String> {
        let context = self.retrieve_context(query, self.top_k).await?;
        let messages = build_prompt(history, &context, query);

        self.model
            .complete(&messages, self.sampling)
            .await
            .context("Failed to generate reply")
    }
}

// ============================================================================
// Tests
// ============================================================================
