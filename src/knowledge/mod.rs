//! Knowledge 모듈 - 벡터 컬렉션 저장소
//!
//! - LanceDB: (id, embedding, document) 트리플 영속화 + 최근접 이웃 검색
//! - 컬렉션 메타데이터: 임베딩 모델 식별자 기록 및 쿼리 시 검증

mod lance;
mod vector;

// Re-exports
pub use lance::LanceVectorStore;
pub use vector::{CollectionMeta, PassageEntry, ScoredPassage, VectorStore};
