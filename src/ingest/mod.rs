//! 잉제스트 모듈 - 말뭉치를 컬렉션으로 인덱싱
//!
//! 말뭉치의 각 패시지를 순서대로 임베딩하여 (id, embedding, document)
//! 트리플로 스토어에 기록합니다. id는 패시지의 0-based 위치입니다.
//!
//! 에러 정책: 배치 허용(batch-tolerant)입니다. 개별 패시지의 임베딩/저장
//! 실패는 위치와 함께 로그로 남기고 다음 패시지로 넘어갑니다 - 실행 전체가
//! 한 건 때문에 중단되는 일은 없습니다. 결과는 `IngestReport`로 요약됩니다.

use std::path::Path;

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;
use crate::knowledge::{CollectionMeta, PassageEntry, VectorStore};

/// 진행 로그 주기 (패시지 건수)
const PROGRESS_INTERVAL: usize = 1000;

// ============================================================================
// Types
// ============================================================================

/// 실패한 패시지 기록
#[derive(Debug, Clone)]
pub struct IngestFailure {
    /// 말뭉치 내 0-based 위치
    pub position: usize,
    /// 실패 원인
    pub error: String,
}

/// 잉제스트 실행 요약
///
/// 성공 여부는 결과 컬렉션 상태로 정의됩니다. 이 리포트는 운영자용
/// 정보일 뿐 실패 항목이 있어도 실행 자체는 성공입니다.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// 처리 시도한 패시지 수
    pub attempted: usize,
    /// 인덱싱에 성공한 패시지 수
    pub indexed: usize,
    /// 실패한 패시지 목록
    pub failed: Vec<IngestFailure>,
}

// ============================================================================
// Corpus Loading
// ============================================================================

/// 말뭉치 파일 로드
///
/// - `.jsonl`/`.json`: 한 줄에 JSON 객체 하나, `passage` 또는 `text` 필드에서 원문 추출
/// - 그 외: 플레인 텍스트, 비어 있지 않은 줄 하나가 패시지 하나
///
/// 레코드 순서가 곧 패시지 id가 되므로 순서를 보존합니다.
pub fn load_corpus(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {:?}", path))?;

    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jsonl") || e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_jsonl {
        let mut passages = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(line)
                .with_context(|| format!("Malformed JSON on line {}", line_no + 1))?;
            let text = value
                .get("passage")
                .or_else(|| value.get("text"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Line {} has no string 'passage' or 'text' field",
                        line_no + 1
                    )
                })?;
            passages.push(text.to_string());
        }
        Ok(passages)
    } else {
        Ok(raw
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect())
    }
}

// ============================================================================
// Ingestion Loop
// ============================================================================

/// 말뭉치 인덱싱 실행
///
/// 각 패시지를 순서대로 임베딩하여 스토어에 추가하고, 완료 후
/// 임베딩 모델 메타데이터를 컬렉션에 기록합니다.
///
/// # Arguments
/// * `embedder` - 임베딩 프로바이더 (쿼리 시에도 같은 모델이어야 함)
/// * `store` - 벡터 스토어
/// * `collection` - 컬렉션 이름 (메타데이터 기록용)
/// * `passages` - 말뭉치 (순서 보존)
pub async fn run(
    embedder: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    collection: &str,
    passages: &[String],
) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for (idx, text) in passages.iter().enumerate() {
        report.attempted += 1;

        // 패시지 하나의 실패는 로그 후 건너뜀
        let embedding = match embedder.embed(text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::warn!("Error indexing doc at index {}: {:#}", idx, e);
                report.failed.push(IngestFailure {
                    position: idx,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let entry = PassageEntry {
            id: idx.to_string(),
            embedding,
            document: text.clone(),
        };

        if let Err(e) = store.add_batch(&[entry]).await {
            tracing::warn!("Error indexing doc at index {}: {:#}", idx, e);
            report.failed.push(IngestFailure {
                position: idx,
                error: e.to_string(),
            });
            continue;
        }

        report.indexed += 1;

        // 대용량 말뭉치용 진행 로그
        if idx > 0 && idx % PROGRESS_INTERVAL == 0 {
            tracing::info!("Indexed {} documents so far...", idx);
        }
    }

    // 쿼리 시 모델 일치 검증에 쓰이는 메타데이터 기록
    store
        .record_meta(&CollectionMeta {
            collection: collection.to_string(),
            embedding_model: embedder.model_id().to_string(),
            dimension: embedder.dimension(),
        })
        .await
        .context("Failed to record collection metadata")?;

    tracing::info!(
        "Indexing complete. attempted={}, indexed={}, failed={}",
        report.attempted,
        report.indexed,
        report.failed.len()
    );

    Ok(report)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::LanceVectorStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::TempDir;

    /// 고정 어휘 기반 결정적 임베더
    ///
    /// 어휘의 각 토큰이 고유한 차원을 가지므로 어휘 충돌이 없고,
    /// 토큰이 겹치는 패시지가 기하적으로 가까워집니다.
    struct LexicalEmbedder {
        vocab: Vec<String>,
    }

    impl LexicalEmbedder {
        fn from_texts(texts: &[&str]) -> Self {
            let mut vocab = Vec::new();
            for text in texts {
                for token in text.split_whitespace() {
                    let token = token.to_lowercase();
                    if !vocab.contains(&token) {
                        vocab.push(token);
                    }
                }
            }
            Self { vocab }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for LexicalEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut vector = vec![0.0f32; self.vocab.len()];
            for token in text.split_whitespace() {
                let token = token.to_lowercase();
                if let Some(pos) = self.vocab.iter().position(|v| *v == token) {
                    vector[pos] += 1.0;
                }
            }
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut vector {
                    *x /= norm;
                }
            }
            Ok(vector)
        }

        fn dimension(&self) -> usize {
            self.vocab.len()
        }

        fn model_id(&self) -> &str {
            "lexical-test-embedder"
        }
    }

    /// "poison"이 들어간 패시지에서 실패하는 결함 주입 래퍼
    struct FaultyEmbedder {
        inner: LexicalEmbedder,
    }

    #[async_trait]
    impl EmbeddingProvider for FaultyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                anyhow::bail!("simulated embedding failure");
            }
            self.inner.embed(text).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_id(&self) -> &str {
            "lexical-test-embedder"
        }
    }

    async fn open_store(dir: &TempDir, dimension: usize) -> LanceVectorStore {
        LanceVectorStore::open(&dir.path().join("wiki.lance"), "wiki", dimension)
            .await
            .unwrap()
    }

    #[test]
    fn test_load_corpus_plain_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.txt");
        std::fs::write(&path, "first passage\n\n  second passage  \nthird\n").unwrap();

        let passages = load_corpus(&path).unwrap();
        assert_eq!(passages, vec!["first passage", "second passage", "third"]);
    }

    #[test]
    fn test_load_corpus_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"passage": "first"}}"#).unwrap();
        writeln!(file, r#"{{"text": "second"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"passage": "third"}}"#).unwrap();

        let passages = load_corpus(&path).unwrap();
        assert_eq!(passages, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_load_corpus_jsonl_missing_field_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corpus.jsonl");
        std::fs::write(&path, r#"{"title": "no passage here"}"#).unwrap();

        assert!(load_corpus(&path).is_err());
    }

    #[tokio::test]
    async fn test_ingest_indexes_all_passages() {
        let corpus: Vec<String> = vec![
            "the eiffel tower stands in paris".to_string(),
            "zebras graze on the savanna".to_string(),
            "rust compiles to native code".to_string(),
        ];
        let refs: Vec<&str> = corpus.iter().map(|s| s.as_str()).collect();
        let embedder = LexicalEmbedder::from_texts(&refs);

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, embedder.dimension()).await;

        let report = run(&embedder, &store, "wiki", &corpus).await.unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.indexed, 3);
        assert!(report.failed.is_empty());
        assert_eq!(store.count().await.unwrap(), 3);

        // 메타데이터가 기록되었는지 확인
        let meta = store.read_meta().await.unwrap().unwrap();
        assert_eq!(meta.embedding_model, "lexical-test-embedder");
        assert_eq!(meta.collection, "wiki");
    }

    #[tokio::test]
    async fn test_ingest_tolerates_per_record_failures() {
        let corpus: Vec<String> = vec![
            "good passage one".to_string(),
            "this one is poison".to_string(),
            "good passage two".to_string(),
            "more poison here".to_string(),
            "good passage three".to_string(),
        ];
        let refs: Vec<&str> = corpus.iter().map(|s| s.as_str()).collect();
        let embedder = FaultyEmbedder {
            inner: LexicalEmbedder::from_texts(&refs),
        };

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, embedder.dimension()).await;

        let report = run(&embedder, &store, "wiki", &corpus).await.unwrap();

        // 전체 레코드를 끝까지 처리하고, 성공분만 컬렉션에 남음
        assert_eq!(report.attempted, 5);
        assert_eq!(report.indexed, 3);
        let failed_positions: Vec<usize> = report.failed.iter().map(|f| f.position).collect();
        assert_eq!(failed_positions, vec![1, 3]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_ingest_then_retrieve_unique_token() {
        let corpus: Vec<String> = vec![
            "the eiffel tower stands in paris".to_string(),
            "whales sing in the deep ocean".to_string(),
            "the ZEBRAFINCH123 sings at dawn".to_string(),
            "rust compiles to native code".to_string(),
            "bread rises thanks to yeast".to_string(),
        ];
        let mut refs: Vec<&str> = corpus.iter().map(|s| s.as_str()).collect();
        refs.push("ZEBRAFINCH123");
        let embedder = LexicalEmbedder::from_texts(&refs);

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir, embedder.dimension()).await;

        run(&embedder, &store, "wiki", &corpus).await.unwrap();

        // 고유 토큰으로 검색하면 해당 패시지가 1위
        let query = embedder.embed("ZEBRAFINCH123").await.unwrap();
        let results = store.search(&query, 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "2");
        assert_eq!(results[0].document, "the ZEBRAFINCH123 sings at dawn");
    }
}
