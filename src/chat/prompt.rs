//! 프롬프트 조립 - 시스템 규칙 + 히스토리 + 검색 컨텍스트 + 새 질문
//!
//! 순수 함수입니다: 같은 입력은 항상 바이트 단위로 같은 메시지 시퀀스를
//! 만듭니다. 히스토리와 컨텍스트는 검증/절단 없이 그대로 통과시킵니다
//! (과대 입력 거부는 생성 서비스의 책임).

use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// 역할 태그가 붙은 채팅 메시지
///
/// 요청 히스토리와 생성 API 페이로드 양쪽에서 같은 JSON 형태를 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// "system" | "user" | "assistant" (히스토리는 검증 없이 통과)
    pub role: String,
    /// 메시지 본문
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// 대화 히스토리의 한 턴 (호출자가 공급, 시스템은 영속화하지 않음)
pub type Turn = ChatMessage;

// ============================================================================
// Fixed Replies
// ============================================================================

/// 인사에 대한 고정 응답 (시스템 규칙 1)
pub const GREETING_REPLY: &str = "Hello! How can I assist you today?";

/// 컨텍스트에 답이 없을 때의 고정 거절 문장 (시스템 규칙 3)
pub const REFUSAL_REPLY: &str =
    "I'm sorry, but I can't find that information in the provided context.";

// ============================================================================
// Prompt Assembly
// ============================================================================

/// 생성 서비스에 보낼 전체 메시지 시퀀스 구성
///
/// 정확히 다음 순서를 보장합니다:
/// 1. 시스템 메시지 1개 (행동 규칙 + "Context:" 라벨 + 패시지들)
/// 2. `history`의 각 턴을 원래 순서 그대로
/// 3. `query`를 담은 user 메시지 1개
///
/// # Arguments
/// * `history` - 이전 대화 턴 (비어 있을 수 있음)
/// * `context` - 검색된 패시지 원문 (비어 있을 수 있음)
/// * `query` - 현재 사용자 질문
pub fn build_prompt(history: &[Turn], context: &[String], query: &str) -> Vec<ChatMessage> {
    let system = format!(
        "You are a friendly, conversational assistant that always considers the full chat history.\n\
         \n\
         1) If the user simply greets you (\"hi\", \"hello\", \"hey\"), reply exactly:\n   \
         \"{GREETING_REPLY}\"\n\
         2) If the user asks a meta-question about our conversation\n   \
         (e.g. \"what did I just ask?\", \"what questions have I asked?\"), answer from the prior turns.\n\
         3) Otherwise, for any factual question, answer only from the context below.\n   \
         If the answer cannot be found there, reply exactly:\n   \
         \"{REFUSAL_REPLY}\"\n\
         \n\
         Always paraphrase and speak naturally - do not quote verbatim.\n\
         \n\
         ---\n\
         Context:\n{context}",
        context = context.join("\n\n"),
    );

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));

    // 이전 대화 턴 (역할/내용 그대로 통과)
    messages.extend(history.iter().cloned());

    // 현재 질문이 마지막 user 메시지
    messages.push(ChatMessage::user(query));

    messages
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_history() -> Vec<Turn> {
        vec![
            ChatMessage::user("Where is the Eiffel Tower?"),
            ChatMessage::assistant("It is in Paris."),
        ]
    }

    #[test]
    fn test_build_prompt_deterministic() {
        let history = sample_history();
        let context = vec!["The Eiffel Tower is in Paris.".to_string()];

        let a = build_prompt(&history, &context, "How tall is it?");
        let b = build_prompt(&history, &context, "How tall is it?");
        assert_eq!(a, b);
    }

    #[test]
    fn test_message_ordering() {
        let history = sample_history();
        let messages = build_prompt(&history, &[], "How tall is it?");

        // 1 (system) + len(history) + 1 (user)
        assert_eq!(messages.len(), 1 + history.len() + 1);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1], history[0]);
        assert_eq!(messages[2], history[1]);

        let last = messages.last().unwrap();
        assert_eq!(last.role, "user");
        assert_eq!(last.content, "How tall is it?");
    }

    #[test]
    fn test_empty_history_and_context() {
        let messages = build_prompt(&[], &[], "hello");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn test_system_message_contains_greeting_instruction() {
        let messages = build_prompt(&[], &[], "hello");
        assert!(messages[0].content.contains(GREETING_REPLY));
    }

    #[test]
    fn test_system_message_contains_refusal_and_context_verbatim() {
        let context = vec!["The Eiffel Tower is in Paris.".to_string()];
        let messages = build_prompt(&[], &context, "What color is the tower?");

        let system = &messages[0].content;
        assert!(system.contains(REFUSAL_REPLY));
        assert!(system.contains("Context:"));
        assert!(system.contains("The Eiffel Tower is in Paris."));
    }

    #[test]
    fn test_context_passages_joined_with_blank_line() {
        let context = vec!["First passage.".to_string(), "Second passage.".to_string()];
        let messages = build_prompt(&[], &context, "q");
        assert!(messages[0]
            .content
            .contains("First passage.\n\nSecond passage."));
    }

    #[test]
    fn test_history_roles_passed_through_unvalidated() {
        let history = vec![ChatMessage {
            role: "narrator".to_string(),
            content: "unchecked role".to_string(),
        }];
        let messages = build_prompt(&history, &[], "q");
        assert_eq!(messages[1].role, "narrator");
    }
}
