//! wiki-rag - 검색 증강 챗 서비스
//!
//! 말뭉치를 LanceDB 컬렉션으로 임베딩하고, 질문과 가장 유사한 패시지를
//! 검색해 시스템 규칙 + 히스토리 + 컨텍스트 프롬프트를 조립한 뒤
//! OpenAI 호환 생성 서비스에 전달하는 RAG 챗봇입니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod ingest;
pub mod knowledge;
pub mod server;

// Re-exports
pub use chat::{
    build_prompt, ChatMessage, ChatModel, ChatService, OpenAiChatModel, SamplingParams, Turn,
    GREETING_REPLY, REFUSAL_REPLY,
};
pub use config::{get_data_dir, Config};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, OpenAiEmbedding};
pub use ingest::{load_corpus, IngestFailure, IngestReport};
pub use knowledge::{
    CollectionMeta, LanceVectorStore, PassageEntry, ScoredPassage, VectorStore,
};
