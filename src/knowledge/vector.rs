//! Vector Store - 벡터 검색 트레이트 및 유틸리티
//!
//! 컬렉션은 (id, embedding, document) 트리플의 집합입니다.
//! id는 잉제스트 시 말뭉치 내 위치를 문자열화한 값으로, 컬렉션 내에서 유일합니다.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 패시지 엔트리 (저장용)
#[derive(Debug, Clone)]
pub struct PassageEntry {
    /// 패시지 ID (말뭉치 내 0-based 위치의 문자열)
    pub id: String,
    /// 임베딩 벡터
    pub embedding: Vec<f32>,
    /// 패시지 원문
    pub document: String,
}

/// 검색 결과 (유사도 내림차순)
#[derive(Debug, Clone)]
pub struct ScoredPassage {
    /// 패시지 ID
    pub id: String,
    /// 패시지 원문
    pub document: String,
    /// 쿼리와의 거리 (스토어 메트릭 기준, 작을수록 유사)
    pub distance: f32,
}

/// 컬렉션 메타데이터
///
/// 어떤 임베딩 모델이 컬렉션을 생성했는지 기록합니다.
/// 쿼리 시 설정된 모델과 일치하지 않으면 즉시 실패합니다 -
/// 모델이 다르면 유사도 점수가 의미를 잃기 때문입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMeta {
    /// 컬렉션 이름
    pub collection: String,
    /// 컬렉션을 생성한 임베딩 모델
    pub embedding_model: String,
    /// 임베딩 차원
    pub dimension: usize,
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다. 유사도 계산은 스토어에 위임합니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 패시지 배치 삽입
    ///
    /// 같은 id로 다시 삽입할 때의 동작(덮어쓰기/중복)은 스토어 구현에 위임합니다.
    async fn add_batch(&self, entries: &[PassageEntry]) -> Result<usize>;

    /// 최근접 이웃 검색 (유사도 내림차순, 최대 `limit` 건)
    ///
    /// 컬렉션이 존재하지 않으면 에러를 반환합니다 - 쿼리 경로는
    /// 빈 스토어를 복구 불가능한 상태로 취급합니다.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredPassage>>;

    /// 패시지 개수 조회
    async fn count(&self) -> Result<usize>;

    /// 컬렉션 메타데이터 기록 (잉제스트 완료 시 호출)
    async fn record_meta(&self, meta: &CollectionMeta) -> Result<()>;

    /// 기록된 컬렉션 메타데이터 조회
    async fn read_meta(&self) -> Result<Option<CollectionMeta>>;

    /// 임베딩 모델 일치 검증
    ///
    /// 기본 구현: 메타데이터가 기록되어 있으면 모델 식별자를 비교하고,
    /// 불일치 시 에러를 반환합니다. 메타데이터가 없으면 통과합니다
    /// (메타데이터 도입 전에 만든 컬렉션 호환).
    async fn verify_model(&self, expected_model: &str) -> Result<()> {
        if let Some(meta) = self.read_meta().await? {
            anyhow::ensure!(
                meta.embedding_model == expected_model,
                "Embedding model mismatch: collection '{}' was built with '{}', \
                 but '{}' is configured. Re-run ingest or fix the configuration.",
                meta.collection,
                meta.embedding_model,
                expected_model
            );
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_meta_roundtrip() {
        let meta = CollectionMeta {
            collection: "wiki".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let parsed: CollectionMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }
}
