//! Document service coordinating extraction, chunking, embedding, retrieval and citation.

use crate::{
    config::Config,
    embedding::{SharedEmbedder, build_embedding_client},
    extract::{DocumentExtractor, DocumentKind, ExtractionError, PageText, TextExtractor},
    generation::{SharedGenerator, build_generation_client},
    index::{SharedIndex, VectorIndex},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::{ChunkingSettings, chunk_pages},
        citations::CitationAttributor,
        engine::RagEngine,
        prompt::PromptScope,
        sanitize::{clean_text, sanitize_string},
        session::SessionRegistry,
        types::{
            HealthSnapshot, IndexStats, IngestOutcome, ProcessingError, QueryOutcome, QueryRequest,
            SessionInfo, SessionMode, Upload,
        },
    },
    retention::TransientWorkspace,
};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Owns the shared knowledge base, the open sessions and the provider clients.
///
/// Both the HTTP surface and the CLI drive the pipeline through this type. Construct it once
/// near process start and share it through an `Arc`.
pub struct DocumentService {
    config: Config,
    embedder: SharedEmbedder,
    generator: SharedGenerator,
    extractor: Arc<dyn TextExtractor>,
    attributor: CitationAttributor,
    knowledge_base: SharedIndex,
    sessions: SessionRegistry,
    metrics: Arc<PipelineMetrics>,
    started_at: String,
}

/// Abstraction over the document pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Index one upload into the shared knowledge base.
    async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, ProcessingError>;

    /// Answer a question from the shared knowledge base.
    async fn query(&self, request: QueryRequest) -> Result<QueryOutcome, ProcessingError>;

    /// Open a session with its own, initially empty, indexes.
    async fn create_session(&self, mode: SessionMode) -> SessionInfo;

    /// Index uploads into a session, in order.
    async fn add_session_documents(
        &self,
        session_id: Uuid,
        uploads: Vec<Upload>,
    ) -> Result<Vec<IngestOutcome>, ProcessingError>;

    /// Answer a question within a session; multi-document sessions answer once per document.
    async fn query_session(
        &self,
        session_id: Uuid,
        request: QueryRequest,
    ) -> Result<Vec<QueryOutcome>, ProcessingError>;

    /// Close a session and drop its indexes.
    async fn close_session(&self, session_id: Uuid) -> Result<(), ProcessingError>;

    /// Readiness and index statistics.
    async fn health(&self) -> HealthSnapshot;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build the service with the providers selected by `config`.
    pub fn new(config: Config) -> Result<Self, ProcessingError> {
        tracing::info!("Initializing provider clients");
        let embedder = build_embedding_client(&config)?;
        let generator = build_generation_client(&config)?;
        let extractor = Arc::new(DocumentExtractor::new(config.pdftotext_bin.clone()));
        Ok(Self::from_parts(config, embedder, generator, extractor))
    }

    /// Assemble the service from explicit components.
    pub fn from_parts(
        config: Config,
        embedder: SharedEmbedder,
        generator: SharedGenerator,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let started_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            attributor: CitationAttributor::new(Arc::clone(&embedder)),
            knowledge_base: VectorIndex::shared(config.hnsw),
            sessions: SessionRegistry::new(config.hnsw),
            metrics: Arc::new(PipelineMetrics::new()),
            config,
            embedder,
            generator,
            extractor,
            started_at,
        }
    }

    /// Runtime configuration the service was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract, chunk, embed and index one upload into `index`.
    ///
    /// The upload only touches disk inside a [`TransientWorkspace`], which is purged as soon as
    /// extraction returns, whatever the outcome.
    async fn ingest_into(
        &self,
        index: &SharedIndex,
        upload: Upload,
    ) -> Result<IngestOutcome, ProcessingError> {
        self.config.ensure_credentials()?;

        let Upload { filename, bytes } = upload;
        let filename = sanitize_string(Some(filename)).unwrap_or_else(|| "upload".to_string());
        if bytes.is_empty() {
            return Err(ProcessingError::InvalidInput(format!(
                "Uploaded file '{filename}' is empty"
            )));
        }
        let kind = DocumentKind::detect(&filename, &bytes)
            .ok_or_else(|| ExtractionError::UnsupportedFormat(filename.clone()))?;
        let fingerprint = hex::encode(Sha256::digest(&bytes));

        let pages = {
            let workspace = TransientWorkspace::open(&self.config.temp_upload_dir).await?;
            let path = workspace.write_upload(&filename, &bytes).await?;
            drop(bytes);
            self.extractor.extract(&path, kind).await?
        };

        let pages: Vec<PageText> = pages
            .into_iter()
            .map(|page| PageText {
                text: clean_text(&page.text, self.config.strip_non_ascii),
                page_number: page.page_number,
            })
            .filter(|page| !page.text.is_empty())
            .collect();

        let chunks = chunk_pages(
            &pages,
            &filename,
            &ChunkingSettings::from_config(&self.config),
        )?;
        if chunks.is_empty() {
            return Err(ProcessingError::NoExtractableText(filename));
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        let summary = index.write().await.add(vectors, chunks)?;

        self.metrics.record_document(summary.count as u64);
        tracing::info!(
            filename = %filename,
            pages = pages.len(),
            chunks = summary.count,
            total = summary.total,
            "Document indexed"
        );

        Ok(IngestOutcome {
            filename,
            embeddings_created: summary.count,
            total_embeddings: summary.total,
            pages: pages.len(),
            fingerprint,
        })
    }

    /// Validate the question and resolve `k` against the configured bounds.
    fn prepare_query(
        &self,
        request: &QueryRequest,
        default_k: usize,
    ) -> Result<(String, usize), ProcessingError> {
        self.config.ensure_credentials()?;
        let query = sanitize_string(Some(request.query.clone()))
            .ok_or_else(|| ProcessingError::InvalidInput("Query must not be empty".into()))?;
        let k = match request.k {
            Some(0) => {
                return Err(ProcessingError::InvalidInput(
                    "k must be greater than zero".into(),
                ));
            }
            Some(k) => k.min(self.config.query_max_top_k),
            None => default_k,
        };
        Ok((query, k))
    }

    async fn answer_from(
        &self,
        index: SharedIndex,
        document: Option<String>,
        query: &str,
        k: usize,
        request: &QueryRequest,
    ) -> Result<QueryOutcome, ProcessingError> {
        let scope = match &document {
            Some(name) => PromptScope::Document(name.clone()),
            None => PromptScope::KnowledgeBase,
        };
        let engine = RagEngine::new(index, Arc::clone(&self.embedder), Arc::clone(&self.generator));
        let answer = engine.answer(query, k, request.style, &scope).await?;

        let cited_answer = if request.cite {
            Some(
                self.attributor
                    .attribute(&answer.text, &answer.supporting_chunks)
                    .await?
                    .render(),
            )
        } else {
            None
        };

        Ok(QueryOutcome {
            document,
            answer: answer.text,
            cited_answer,
            context: answer.supporting_chunks,
        })
    }

    /// Index one upload into the shared knowledge base.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, ProcessingError> {
        let index = Arc::clone(&self.knowledge_base);
        self.ingest_into(&index, upload).await
    }

    /// Answer a question from the shared knowledge base.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryOutcome, ProcessingError> {
        let (query, k) = self.prepare_query(&request, self.config.query_top_k)?;
        let outcome = self
            .answer_from(Arc::clone(&self.knowledge_base), None, &query, k, &request)
            .await?;
        self.metrics.record_answers(1);
        Ok(outcome)
    }

    /// Open a session.
    pub async fn create_session(&self, mode: SessionMode) -> SessionInfo {
        self.metrics.record_session();
        self.sessions.create(mode).await
    }

    /// Index uploads into a session, stopping at the first failure.
    pub async fn add_session_documents(
        &self,
        session_id: Uuid,
        uploads: Vec<Upload>,
    ) -> Result<Vec<IngestOutcome>, ProcessingError> {
        let session = self.sessions.get(session_id).await?;
        if uploads.is_empty() {
            return Err(ProcessingError::InvalidInput("No files were uploaded".into()));
        }

        let mut outcomes = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let target = session.ingest_target();
            let outcome = self.ingest_into(&target, upload).await?;
            session.install(&outcome.filename, target).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Answer within a session. Multi-document sessions answer every document concurrently.
    pub async fn query_session(
        &self,
        session_id: Uuid,
        request: QueryRequest,
    ) -> Result<Vec<QueryOutcome>, ProcessingError> {
        let session = self.sessions.get(session_id).await?;
        let default_k = match session.mode() {
            SessionMode::Single => self.config.query_top_k,
            SessionMode::Multi => self.config.multi_query_top_k,
        };
        let (query, k) = self.prepare_query(&request, default_k)?;

        let targets = session.query_targets().await;
        if targets.is_empty() {
            return Err(ProcessingError::EmptyIndex);
        }

        let outcomes = try_join_all(
            targets
                .into_iter()
                .map(|(document, index)| self.answer_from(index, document, &query, k, &request)),
        )
        .await?;
        self.metrics.record_answers(outcomes.len() as u64);
        Ok(outcomes)
    }

    /// Close a session.
    pub async fn close_session(&self, session_id: Uuid) -> Result<(), ProcessingError> {
        self.sessions.close(session_id).await
    }

    /// Readiness snapshot with live statistics of the shared knowledge base.
    pub async fn health(&self) -> HealthSnapshot {
        let index = {
            let index = self.knowledge_base.read().await;
            let params = index.params();
            IndexStats {
                vectors: index.len(),
                dimension: index.dimension().unwrap_or(self.config.embedding_dimension),
                m: params.m,
                ef_construction: params.ef_construction,
                ef_search: params.ef_search,
            }
        };
        HealthSnapshot {
            status: "online",
            engine: "HNSW",
            retention_policy: "zero-data",
            index,
            active_sessions: self.sessions.len().await,
            started_at: self.started_at.clone(),
        }
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for DocumentService {
    async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, ProcessingError> {
        DocumentService::ingest(self, upload).await
    }

    async fn query(&self, request: QueryRequest) -> Result<QueryOutcome, ProcessingError> {
        DocumentService::query(self, request).await
    }

    async fn create_session(&self, mode: SessionMode) -> SessionInfo {
        DocumentService::create_session(self, mode).await
    }

    async fn add_session_documents(
        &self,
        session_id: Uuid,
        uploads: Vec<Upload>,
    ) -> Result<Vec<IngestOutcome>, ProcessingError> {
        DocumentService::add_session_documents(self, session_id, uploads).await
    }

    async fn query_session(
        &self,
        session_id: Uuid,
        request: QueryRequest,
    ) -> Result<Vec<QueryOutcome>, ProcessingError> {
        DocumentService::query_session(self, session_id, request).await
    }

    async fn close_session(&self, session_id: Uuid) -> Result<(), ProcessingError> {
        DocumentService::close_session(self, session_id).await
    }

    async fn health(&self) -> HealthSnapshot {
        DocumentService::health(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}
