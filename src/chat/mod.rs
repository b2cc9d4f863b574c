//! Chat 모듈 - RAG 챗 파이프라인
//!
//! - prompt: 시스템 규칙 + 히스토리 + 컨텍스트 프롬프트 조립 (순수 함수)
//! - generate: OpenAI 호환 ChatCompletion 클라이언트
//! - service: 검색 → 조립 → 생성 파이프라인 (의존성 주입 컨텍스트)

mod generate;
mod prompt;
mod service;

// Re-exports
pub use generate::{ChatModel, OpenAiChatModel, SamplingParams};
pub use prompt::{build_prompt, ChatMessage, Turn, GREETING_REPLY, REFUSAL_REPLY};
pub use service::ChatService;
