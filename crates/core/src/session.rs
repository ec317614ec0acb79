//! Per-session document state.
//!
//! A session holds at most one indexed document. Indexing builds a fresh
//! [`IndexedDocument`] without holding any lock and then swaps it in, so a
//! query that already took a snapshot keeps answering from the old document
//! while a new upload is being indexed.

use crate::chunking::{chunk_words, ChunkingConfig};
use crate::embeddings::{Embedder, HashedNgramEmbedder};
use crate::index::EmbeddingIndex;
use crate::models::Document;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// A document together with its chunks and index. Never mutated after construction.
#[derive(Debug)]
pub struct IndexedDocument {
    pub document: Document,
    /// `None` when the text had no words to index.
    pub index: Option<EmbeddingIndex>,
    pub checksum: String,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedDocument {
    pub fn build(
        document: Document,
        chunking: &ChunkingConfig,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let chunks = chunk_words(&document.full_text, chunking);
        let chunk_count = chunks.len();
        let index = EmbeddingIndex::build(chunks, embedder);
        let checksum = text_checksum(&document.full_text);

        if index.is_none() {
            warn!(checksum = %checksum, "document has no indexable text");
        } else {
            info!(
                checksum = %checksum,
                chunk_count,
                file_type = document.metadata.file_type.as_deref().unwrap_or("unknown"),
                is_image = document.metadata.is_image,
                "document indexed"
            );
        }

        Self {
            document,
            index,
            checksum,
            indexed_at: Utc::now(),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.index.as_ref().map_or(0, EmbeddingIndex::len)
    }

    /// Chunks in document order; empty when nothing was indexable.
    pub fn chunks(&self) -> &[String] {
        self.index
            .as_ref()
            .map(EmbeddingIndex::chunks)
            .unwrap_or_default()
    }
}

pub fn text_checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct DocumentSession {
    id: Uuid,
    chunking: ChunkingConfig,
    embedder: Arc<dyn Embedder>,
    current: RwLock<Option<Arc<IndexedDocument>>>,
}

impl DocumentSession {
    pub fn new(chunking: ChunkingConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunking,
            embedder,
            current: RwLock::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Replaces the session's document wholesale and returns the new snapshot.
    pub async fn index(&self, document: Document) -> Arc<IndexedDocument> {
        let built = Arc::new(IndexedDocument::build(
            document,
            &self.chunking,
            self.embedder.clone(),
        ));

        let mut current = self.current.write().await;
        if let Some(previous) = current.as_ref() {
            if previous.checksum != built.checksum {
                info!(session = %self.id, previous = %previous.checksum, "replacing document");
            }
        }
        *current = Some(built.clone());
        built
    }

    pub async fn current(&self) -> Option<Arc<IndexedDocument>> {
        self.current.read().await.clone()
    }

    pub async fn clear(&self) {
        self.current.write().await.take();
    }
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new(
            ChunkingConfig::default(),
            Arc::new(HashedNgramEmbedder::default()),
        )
    }
}

/// Sessions keyed by id, for hosts serving several users at once.
pub struct SessionRegistry {
    chunking: ChunkingConfig,
    embedder: Arc<dyn Embedder>,
    sessions: RwLock<HashMap<Uuid, Arc<DocumentSession>>>,
}

impl SessionRegistry {
    pub fn new(chunking: ChunkingConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            chunking,
            embedder,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> Arc<DocumentSession> {
        let session = Arc::new(DocumentSession::new(self.chunking, self.embedder.clone()));
        self.sessions
            .write()
            .await
            .insert(session.id(), session.clone());
        session
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<DocumentSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<DocumentSession>> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
