//! HTTP 서버 - 챗 API의 얇은 전송 계층
//!
//! - `GET /` : 내장된 프론트엔드 페이지
//! - `GET /healthz` : 헬스체크
//! - `POST /api/chat` : { history, query } -> { response }
//!
//! 코어의 에러는 여기서 500 + JSON 메시지로 변환됩니다. 인증이나
//! 요율 제한은 없습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatService, Turn};

/// 내장 프론트엔드 페이지
const INDEX_HTML: &str = include_str!("../../static/index.html");

// ============================================================================
// Types
// ============================================================================

#[derive(Clone)]
struct AppState {
    service: Arc<ChatService>,
}

/// POST /api/chat 요청 본문
#[derive(Debug, Deserialize)]
struct ChatRequest {
    /// 이전 대화 턴 (호출자가 관리)
    #[serde(default)]
    history: Vec<Turn>,
    /// 현재 질문
    query: String,
}

/// POST /api/chat 응답 본문
#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// Server
// ============================================================================

/// 라우터 구성
pub fn router(service: Arc<ChatService>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat_handler))
        .with_state(AppState { service })
}

/// 서버 실행 (종료까지 블록)
pub async fn serve(bind: &str, service: Arc<ChatService>) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", bind))?;

    let app = router(service);

    tracing::info!("wiki-rag listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app).await.context("Server shutdown")
}

// ============================================================================
// Handlers
// ============================================================================

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

/// 챗 요청 처리
///
/// 요청 하나는 응답 하나로 성공하거나 전체가 실패합니다 -
/// 코어에서 올라온 에러는 그대로 500으로 변환합니다.
async fn chat_handler(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let reply = state
        .service
        .respond(&request.history, &request.query)
        .await
        .map_err(internal_error)?;

    Ok(Json(ChatResponse { response: reply }))
}

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<ErrorBody>) {
    tracing::error!("Chat request failed: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            message: err.to_string(),
        }),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ChatModel, SamplingParams};
    use crate::embedding::EmbeddingProvider;
    use crate::knowledge::{CollectionMeta, PassageEntry, ScoredPassage, VectorStore};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_id(&self) -> &str {
            "stub-embedder"
        }
    }

    /// `fail_search`가 켜지면 검색 시 에러를 돌려주는 스텁 스토어
    struct StubStore {
        fail_search: bool,
    }

    #[async_trait]
    impl VectorStore for StubStore {
        async fn add_batch(&self, _entries: &[PassageEntry]) -> anyhow::Result<usize> {
            Ok(0)
        }

        async fn search(&self, _query: &[f32], limit: usize) -> anyhow::Result<Vec<ScoredPassage>> {
            if self.fail_search {
                anyhow::bail!("Collection 'wiki' does not exist yet. Run ingest first.");
            }
            Ok((0..limit.min(1))
                .map(|i| ScoredPassage {
                    id: i.to_string(),
                    document: "Seoul is the capital of South Korea.".to_string(),
                    distance: i as f32,
                })
                .collect())
        }

        async fn count(&self) -> anyhow::Result<usize> {
            Ok(1)
        }

        async fn record_meta(&self, _meta: &CollectionMeta) -> anyhow::Result<()> {
            Ok(())
        }

        async fn read_meta(&self) -> anyhow::Result<Option<CollectionMeta>> {
            Ok(Some(CollectionMeta {
                collection: "wiki".to_string(),
                embedding_model: "stub-embedder".to_string(),
                dimension: 3,
            }))
        }
    }

    struct StubModel;

    #[async_trait]
    impl ChatModel for StubModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: SamplingParams,
        ) -> anyhow::Result<String> {
            Ok("stub reply".to_string())
        }
    }

    fn stub_router(fail_search: bool) -> Router {
        let service = ChatService::new(
            Arc::new(StubEmbedder),
            Arc::new(StubStore { fail_search }),
            Arc::new(StubModel),
            SamplingParams {
                top_p: 0.9,
                temperature: 0.8,
            },
            3,
        );
        router(Arc::new(service))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_endpoint_returns_reply() {
        let app = stub_router(false);

        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"history": [], "query": "capital of Korea?"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["response"], "stub reply");
    }

    #[tokio::test]
    async fn test_chat_endpoint_maps_core_error_to_500_json() {
        let app = stub_router(true);

        let request = Request::post("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query": "anything"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        let message = json["message"].as_str().unwrap();
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn test_healthz_responds_ok() {
        let app = stub_router(false);

        let request = Request::get("/healthz").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_chat_request_deserialization() {
        let json = r#"{
            "history": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "Hello! How can I assist you today?"}
            ],
            "query": "What did I just say?"
        }"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.history.len(), 2);
        assert_eq!(request.history[0].role, "user");
        assert_eq!(request.query, "What did I just say?");
    }

    #[test]
    fn test_chat_request_history_defaults_to_empty() {
        let request: ChatRequest = serde_json::from_str(r#"{"query": "hello"}"#).unwrap();
        assert!(request.history.is_empty());
    }

    #[test]
    fn test_chat_response_serialization() {
        let response = ChatResponse {
            response: "Hello!".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["response"], "Hello!");
    }

    #[test]
    fn test_index_page_posts_to_chat_api() {
        assert!(INDEX_HTML.contains("/api/chat"));
    }
}
