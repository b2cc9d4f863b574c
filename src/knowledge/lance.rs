//! LanceDB Vector Store - 컬렉션 영속화 및 최근접 이웃 검색
//!
//! (id, embedding, document) 트리플을 LanceDB 테이블 하나에 저장합니다.
//! 테이블이 없으면 첫 삽입 시 생성합니다 (get-or-create).
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};

use super::vector::{CollectionMeta, PassageEntry, ScoredPassage, VectorStore};

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// 컬렉션 이름이 테이블 이름이 됩니다. 임베딩 모델 메타데이터는
/// `.lance` 디렉토리 옆의 `<collection>.meta.json` 사이드카에 기록합니다.
pub struct LanceVectorStore {
    db: Connection,
    collection: String,
    dimension: i32,
    meta_path: PathBuf,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `collection` - 컬렉션(테이블) 이름
    /// * `dimension` - 임베딩 차원
    pub async fn open(path: &Path, collection: &str, dimension: usize) -> Result<Self> {
        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let meta_path = path.with_extension("meta.json");

        Ok(Self {
            db,
            collection: collection.to_string(),
            dimension: dimension as i32,
            meta_path,
        })
    }

    /// 컬렉션 테이블 스키마 생성
    fn create_schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension,
                ),
                false,
            ),
            Field::new("document", DataType::Utf8, false),
        ])
    }

    /// 엔트리들을 Arrow RecordBatch로 변환
    fn entries_to_batch(&self, entries: &[PassageEntry]) -> Result<RecordBatch> {
        if entries.is_empty() {
            anyhow::bail!("Cannot create batch from empty entries");
        }

        for entry in entries {
            anyhow::ensure!(
                entry.embedding.len() == self.dimension as usize,
                "Passage {} has embedding of length {}, expected {}",
                entry.id,
                entry.embedding.len(),
                self.dimension
            );
        }

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        let documents: Vec<&str> = entries.iter().map(|e| e.document.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = entries
            .iter()
            .flat_map(|e| e.embedding.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            self.dimension,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(embeddings_list),
                Arc::new(StringArray::from(documents)),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> bool {
        self.db
            .table_names()
            .execute()
            .await
            .map(|names| names.contains(&self.collection))
            .unwrap_or(false)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn add_batch(&self, entries: &[PassageEntry]) -> Result<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let batch = self.entries_to_batch(entries)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await {
            // 기존 테이블에 추가
            let table = self
                .db
                .open_table(&self.collection)
                .execute()
                .await
                .context("Failed to open table")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add passages to table")?;
        } else {
            // 새 테이블 생성
            self.db
                .create_table(&self.collection, batches)
                .execute()
                .await
                .context("Failed to create table")?;
        }

        Ok(entries.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredPassage>> {
        // 빈 컬렉션은 쿼리 경로에서 치명적 에러
        if !self.table_exists().await {
            anyhow::bail!(
                "Collection '{}' does not exist yet. Run ingest first.",
                self.collection
            );
        }

        let table = self
            .db
            .open_table(&self.collection)
            .execute()
            .await
            .context("Failed to open table for search")?;

        let results = table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let mut passages = Vec::new();

        // RecordBatch 스트림에서 결과 추출 (LanceDB는 _distance 오름차순 반환)
        use futures::TryStreamExt;
        let batches: Vec<RecordBatch> = results.try_collect().await?;

        for batch in batches {
            let ids = batch
                .column_by_name("id")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing id column"))?;

            let documents = batch
                .column_by_name("document")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow::anyhow!("Missing document column"))?;

            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for i in 0..batch.num_rows() {
                passages.push(ScoredPassage {
                    id: ids.value(i).to_string(),
                    document: documents.value(i).to_string(),
                    distance: distances.value(i),
                });
            }
        }

        Ok(passages)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await {
            return Ok(0);
        }

        let table = self
            .db
            .open_table(&self.collection)
            .execute()
            .await
            .context("Failed to open table for count")?;

        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    async fn record_meta(&self, meta: &CollectionMeta) -> Result<()> {
        let json = serde_json::to_string_pretty(meta)
            .context("Failed to serialize collection metadata")?;
        tokio::fs::write(&self.meta_path, json)
            .await
            .with_context(|| format!("Failed to write {:?}", self.meta_path))?;
        tracing::debug!("Recorded collection metadata at {:?}", self.meta_path);
        Ok(())
    }

    async fn read_meta(&self) -> Result<Option<CollectionMeta>> {
        if !self.meta_path.exists() {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&self.meta_path)
            .await
            .with_context(|| format!("Failed to read {:?}", self.meta_path))?;
        let meta = serde_json::from_str(&json)
            .with_context(|| format!("Malformed collection metadata in {:?}", self.meta_path))?;
        Ok(Some(meta))
    }
}

// ============================================================================
// Tests
// ============================================================================
