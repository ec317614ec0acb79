pub mod chunking;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod index;
pub mod loader;
pub mod metadata;
pub mod models;
pub mod prompts;
pub mod router;
pub mod session;
pub mod status_counter;

pub use chunking::{chunk_words, normalize_whitespace, ChunkingConfig};
pub use conversation::{
    classify_small_talk, with_follow_up, Message, Role, SmallTalk, Transcript, WELCOME_MESSAGE,
};
pub use embeddings::{Embedder, HashedNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{ConfigError, GenerationError, LoadError, QueryError};
pub use generation::{
    BackoffPolicy, GenerationRequest, Generator, GeneratorConfig, HttpGenerator, RetryingClient,
    DEFAULT_ENDPOINT, DEFAULT_MODEL,
};
pub use index::{EmbeddingIndex, Neighbor};
pub use loader::{load_document, LoadOptions};
pub use metadata::resolve_metadata_shortcut;
pub use models::{
    Answer, AnswerStrategy, Document, DocumentMetadata, GenerationSettings, QueryOptions,
};
pub use router::AnswerRouter;
pub use session::{DocumentSession, IndexedDocument, SessionRegistry};
pub use status_counter::{count_statuses, StatusCategory};
