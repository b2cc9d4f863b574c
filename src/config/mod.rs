//! 설정 모듈
//!
//! 벡터 스토어 경로, 임베딩/생성 모델 식별자, 샘플링 파라미터를 관리합니다.
//! API 키는 설정 파일이 아닌 환경변수에서만 읽습니다 (`embedding::get_api_key`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Defaults
// ============================================================================

/// 기본 컬렉션 이름
pub const DEFAULT_COLLECTION: &str = "wiki";

/// 기본 임베딩 모델 (OpenAI)
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// 기본 임베딩 차원 (text-embedding-3-small)
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

/// 기본 생성 모델 (ChatCompletion)
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";

/// OpenAI 호환 API 기본 URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// 데이터 디렉토리 경로 (~/.wiki-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wiki-rag")
}

// ============================================================================
// Config
// ============================================================================

/// 애플리케이션 설정
///
/// 프로세스 시작 시 한 번 생성되어 각 컴포넌트에 주입됩니다.
/// 잉제스트와 쿼리는 반드시 같은 `embedding_model`을 사용해야 하며,
/// 이 불변식은 컬렉션 메타데이터로 검증됩니다 (`knowledge::lance`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 데이터 디렉토리 (LanceDB + 메타데이터 사이드카)
    pub data_dir: PathBuf,
    /// 컬렉션 이름 (LanceDB 테이블)
    pub collection: String,
    /// 임베딩 모델 식별자
    pub embedding_model: String,
    /// 임베딩 차원
    pub embedding_dimension: usize,
    /// 생성 모델 식별자
    pub generation_model: String,
    /// OpenAI 호환 API base URL
    pub base_url: String,
    /// Nucleus sampling 임계값
    pub top_p: f32,
    /// 샘플링 온도
    pub temperature: f32,
    /// 검색 결과 개수 (top-k)
    pub top_k: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            top_p: 0.9,
            temperature: 0.8,
            top_k: 3,
        }
    }
}

impl Config {
    /// 데이터 디렉토리를 지정하여 생성
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// LanceDB 스토어 경로 (`<data_dir>/<collection>.lance`)
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.lance", self.collection))
    }
}

// ============================================================================
// Tests
// ============================================================================
