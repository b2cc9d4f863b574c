//! CLI 모듈
//!
//! wiki-rag 명령어 정의 및 구현

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::chat::ChatService;
use crate::config::Config;
use crate::embedding::{has_api_key, OpenAiEmbedding, API_KEY_ENV, DEFAULT_INGEST_RETRIES};
use crate::ingest::{self, load_corpus};
use crate::knowledge::{LanceVectorStore, VectorStore};
use crate::server;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "wiki-rag")]
#[command(version, about = "위키 RAG 챗봇 - LanceDB 벡터 검색 + OpenAI 생성", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (기본: ~/.wiki-rag/)
    #[arg(long, global = true, env = "WIKI_RAG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 말뭉치 파일을 컬렉션에 인덱싱
    Ingest {
        /// 말뭉치 파일 경로 (.jsonl 또는 플레인 텍스트)
        #[arg(short, long)]
        corpus: PathBuf,
    },

    /// 챗 API 서버 실행
    Serve {
        /// 바인딩 주소 (host:port)
        #[arg(short, long, default_value = "127.0.0.1:8080", env = "WIKI_RAG_BIND")]
        bind: String,
    },

    /// 컬렉션 검색 (검색 결과만 출력, 생성 호출 없음)
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한
        #[arg(short, long, default_value = "3")]
        limit: usize,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = match cli.data_dir {
        Some(dir) => Config::with_data_dir(dir),
        None => Config::default(),
    };

    match cli.command {
        Commands::Ingest { corpus } => cmd_ingest(&config, &corpus).await,
        Commands::Serve { bind } => cmd_serve(&config, &bind).await,
        Commands::Query { query, limit } => cmd_query(&config, &query, limit).await,
        Commands::Status => cmd_status(&config).await,
    }
}

/// API 키 사전 확인
fn require_api_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export {}=your-api-key",
            API_KEY_ENV
        );
    }
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 인덱싱 명령어 (ingest)
///
/// 말뭉치의 각 패시지를 임베딩하여 컬렉션에 기록합니다.
/// 개별 패시지 실패는 건너뛰고 요약에 집계합니다.
async fn cmd_ingest(config: &Config, corpus_path: &PathBuf) -> Result<()> {
    require_api_key()?;

    println!("[*] 말뭉치 로드 중: {:?}", corpus_path);
    let passages = load_corpus(corpus_path).context("말뭉치 로드 실패")?;

    if passages.is_empty() {
        println!("[!] 말뭉치에 패시지가 없습니다.");
        return Ok(());
    }
    println!("[*] 패시지 {} 건 인덱싱 시작", passages.len());

    let embedder = OpenAiEmbedding::from_env(config)
        .context("임베더 초기화 실패")?
        .with_retries(DEFAULT_INGEST_RETRIES);
    let store = LanceVectorStore::open(
        &config.store_path(),
        &config.collection,
        config.embedding_dimension,
    )
    .await
    .context("벡터 스토어 열기 실패")?;

    let report = ingest::run(&embedder, &store, &config.collection, &passages)
        .await
        .context("인덱싱 실패")?;

    println!();
    println!(
        "[OK] 인덱싱 완료: 성공 {}, 실패 {}",
        report.indexed,
        report.failed.len()
    );

    if !report.failed.is_empty() {
        println!("[!] 실패한 패시지:");
        for failure in &report.failed {
            println!("    위치 {}: {}", failure.position, failure.error);
        }
    }

    Ok(())
}

/// 서버 명령어 (serve)
async fn cmd_serve(config: &Config, bind: &str) -> Result<()> {
    require_api_key()?;

    let service = ChatService::open(config)
        .await
        .context("ChatService 초기화 실패")?;

    println!("[*] 서버 시작: http://{}", bind);
    println!("    컬렉션: {} ({:?})", config.collection, config.store_path());

    server::serve(bind, Arc::new(service)).await
}

/// 검색 명령어 (query)
///
/// 생성 호출 없이 검색 결과만 출력합니다 (디버깅용).
async fn cmd_query(config: &Config, query: &str, limit: usize) -> Result<()> {
    require_api_key()?;

    println!("[*] 검색 중: \"{}\"", query);

    let service = ChatService::open(config)
        .await
        .context("ChatService 초기화 실패")?;

    let passages = service
        .retrieve_context(query, limit)
        .await
        .context("검색 실패")?;

    if passages.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", passages.len());
    for (i, passage) in passages.iter().enumerate() {
        println!("--- [{}] ---", i + 1);
        println!("{}\n", passage);
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: &Config) -> Result<()> {
    let store = LanceVectorStore::open(
        &config.store_path(),
        &config.collection,
        config.embedding_dimension,
    )
    .await
    .context("벡터 스토어 열기 실패")?;

    let count = store.count().await.context("패시지 개수 조회 실패")?;
    let meta = store.read_meta().await?;

    println!("[*] wiki-rag 상태");
    println!("    스토어 경로: {:?}", config.store_path());
    println!("    컬렉션: {}", config.collection);
    println!("    패시지 수: {}", count);

    match meta {
        Some(meta) => {
            println!("    임베딩 모델: {} (차원 {})", meta.embedding_model, meta.dimension);
            if meta.embedding_model != config.embedding_model {
                println!(
                    "[!] 설정된 모델({})과 컬렉션 모델이 다릅니다. 재인덱싱이 필요합니다.",
                    config.embedding_model
                );
            }
        }
        None => println!("    임베딩 모델: (메타데이터 없음)"),
    }

    println!(
        "    API 키: {}",
        if has_api_key() { "설정됨" } else { "없음" }
    );

    Ok(())
}
