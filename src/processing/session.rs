//! In-memory session registry.
//!
//! Sessions exist only in process memory. Closing a session (or stopping the process) drops its
//! indexes; nothing is persisted.

use crate::index::{HnswParams, SharedIndex, VectorIndex};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::types::{ProcessingError, SessionInfo, SessionMode};

/// Index of one document in a comparison session.
#[derive(Clone)]
pub struct DocumentIndex {
    /// Filename the index was built from.
    pub name: String,
    /// The document's own index.
    pub index: SharedIndex,
}

enum Knowledge {
    Single(SharedIndex),
    Multi(RwLock<Vec<DocumentIndex>>),
}

/// Documents uploaded under one session id.
pub struct Session {
    mode: SessionMode,
    params: HnswParams,
    knowledge: Knowledge,
}

impl Session {
    fn new(mode: SessionMode, params: HnswParams) -> Self {
        let knowledge = match mode {
            SessionMode::Single => Knowledge::Single(VectorIndex::shared(params)),
            SessionMode::Multi => Knowledge::Multi(RwLock::new(Vec::new())),
        };
        Self {
            mode,
            params,
            knowledge,
        }
    }

    /// Indexing mode chosen at creation.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Index that should receive the next uploaded document.
    ///
    /// Single mode always returns the shared index. Multi mode returns a fresh index that only
    /// becomes visible once passed to [`Session::install`].
    pub fn ingest_target(&self) -> SharedIndex {
        match &self.knowledge {
            Knowledge::Single(index) => Arc::clone(index),
            Knowledge::Multi(_) => VectorIndex::shared(self.params),
        }
    }

    /// Publish a fully built per-document index, replacing any previous one with the same name.
    ///
    /// No-op in single mode, where documents are indexed in place.
    pub async fn install(&self, name: &str, index: SharedIndex) {
        let Knowledge::Multi(documents) = &self.knowledge else {
            return;
        };
        let mut documents = documents.write().await;
        match documents.iter_mut().find(|document| document.name == name) {
            Some(existing) => existing.index = index,
            None => documents.push(DocumentIndex {
                name: name.to_string(),
                index,
            }),
        }
    }

    /// Indexes to query, labelled with their document in multi mode.
    pub async fn query_targets(&self) -> Vec<(Option<String>, SharedIndex)> {
        match &self.knowledge {
            Knowledge::Single(index) => vec![(None, Arc::clone(index))],
            Knowledge::Multi(documents) => documents
                .read()
                .await
                .iter()
                .map(|document| (Some(document.name.clone()), Arc::clone(&document.index)))
                .collect(),
        }
    }
}

/// Open sessions keyed by id.
pub struct SessionRegistry {
    params: HnswParams,
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry whose sessions build indexes with `params`.
    pub fn new(params: HnswParams) -> Self {
        Self {
            params,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a new session.
    pub async fn create(&self, mode: SessionMode) -> SessionInfo {
        let session_id = Uuid::new_v4();
        self.sessions
            .write()
            .await
            .insert(session_id, Arc::new(Session::new(mode, self.params)));
        tracing::info!(%session_id, ?mode, "Session opened");
        SessionInfo { session_id, mode }
    }

    /// Look up an open session.
    pub async fn get(&self, id: Uuid) -> Result<Arc<Session>, ProcessingError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ProcessingError::SessionNotFound(id))
    }

    /// Close a session and drop its indexes.
    pub async fn close(&self, id: Uuid) -> Result<(), ProcessingError> {
        if self.sessions.write().await.remove(&id).is_none() {
            return Err(ProcessingError::SessionNotFound(id));
        }
        tracing::info!(session_id = %id, "Session closed");
        Ok(())
    }

    /// Number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
