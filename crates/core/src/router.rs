use crate::error::{QueryError, NO_DOCUMENT_MESSAGE};
use crate::generation::{BackoffPolicy, GenerationRequest, Generator, RetryingClient};
use crate::metadata::resolve_metadata_shortcut;
use crate::models::{Answer, AnswerStrategy, Document, QueryOptions};
use crate::prompts::{image_prompt, rag_prompt, IMAGE_EMPTY_MESSAGE};
use crate::session::{DocumentSession, IndexedDocument};
use crate::status_counter::count_statuses;
use std::time::Duration;
use tracing::{debug, info};

type Resolver = fn(&str, &Document) -> Option<String>;

fn status_count_resolver(query: &str, document: &Document) -> Option<String> {
    count_statuses(query, &document.full_text)
}

/// Cheap strategies tried before retrieval, in priority order. The first one
/// that returns an answer ends the query.
const HEURISTIC_RESOLVERS: [(AnswerStrategy, Resolver); 2] = [
    (AnswerStrategy::MetadataShortcut, resolve_metadata_shortcut),
    (AnswerStrategy::StatusCount, status_count_resolver),
];

/// Picks exactly one strategy per query and produces the answer text.
///
/// Order: no-document guard, image prompt for OCR text, metadata shortcut,
/// status counter, then retrieval plus generation. Failures never escape as
/// errors; each is turned into a fixed sentence for the user.
pub struct AnswerRouter<G> {
    client: RetryingClient<G>,
    options: QueryOptions,
}

impl<G> AnswerRouter<G>
where
    G: Generator,
{
    pub fn new(generator: G, options: QueryOptions) -> Self {
        let client = RetryingClient::new(generator, BackoffPolicy::from(&options))
            .with_attempt_timeout(options.attempt_timeout_secs.map(Duration::from_secs));
        Self { client, options }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Answers against whatever document `session` holds right now.
    pub async fn answer_in(&self, session: &DocumentSession, query: &str) -> Answer {
        let snapshot = session.current().await;
        self.answer(snapshot.as_deref(), query).await
    }

    pub async fn answer(&self, indexed: Option<&IndexedDocument>, query: &str) -> Answer {
        let Some(indexed) = indexed else {
            return Answer::new(NO_DOCUMENT_MESSAGE, AnswerStrategy::NoDocument);
        };
        let document = &indexed.document;

        if document.metadata.is_image {
            info!(strategy = %AnswerStrategy::ImagePrompt, "routing query");
            return Answer::new(
                self.answer_from_image(document, query).await,
                AnswerStrategy::ImagePrompt,
            );
        }

        for (strategy, resolve) in HEURISTIC_RESOLVERS {
            if let Some(text) = resolve(query, document) {
                info!(strategy = %strategy, "routing query");
                return Answer::new(text, strategy);
            }
        }

        match self.answer_with_retrieval(indexed, query).await {
            Ok(text) => {
                info!(strategy = %AnswerStrategy::RagGeneral, "routing query");
                Answer::new(text, AnswerStrategy::RagGeneral)
            }
            Err(error @ QueryError::Generation(_)) => {
                info!(strategy = %AnswerStrategy::RagGeneral, %error, "generation gave no answer");
                Answer::new(error.user_message(), AnswerStrategy::RagGeneral)
            }
            Err(error) => {
                info!(strategy = %AnswerStrategy::Unavailable, %error, "retrieval unavailable");
                Answer::new(error.user_message(), AnswerStrategy::Unavailable)
            }
        }
    }

    async fn answer_from_image(&self, document: &Document, query: &str) -> String {
        let prompt = image_prompt(&document.full_text, query);
        let request = GenerationRequest::new(prompt, self.options.image)
            .with_stop(&self.options.image_stop)
            .with_empty_answer(IMAGE_EMPTY_MESSAGE);
        self.client.complete(&request).await
    }

    async fn answer_with_retrieval(
        &self,
        indexed: &IndexedDocument,
        query: &str,
    ) -> Result<String, QueryError> {
        let index = indexed
            .index
            .as_ref()
            .ok_or(QueryError::UnindexableDocument)?;

        let chunks = index.search(query, self.options.top_k);
        if chunks.is_empty() {
            return Err(QueryError::NoRelevantContent);
        }
        debug!(retrieved = chunks.len(), top_k = self.options.top_k, "retrieved context");

        let request = GenerationRequest::new(rag_prompt(&chunks, query), self.options.rag);
        Ok(self.client.try_complete(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::embeddings::HashedNgramEmbedder;
    use crate::error::{
        GenerationError, NOT_INDEXED_MESSAGE, NO_CLEAR_ANSWER_MESSAGE, NO_RELEVANT_CONTENT_MESSAGE,
        TEMPORARY_ISSUE_MESSAGE,
    };
    use crate::models::DocumentMetadata;
    use crate::prompts::NOT_FOUND_SENTINEL;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    enum Reply {
        Text(&'static str),
        Fail,
    }

    struct RecordingGenerator {
        reply: Reply,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl RecordingGenerator {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().expect("lock should not be poisoned").clone()
        }
    }

    #[async_trait]
    impl Generator for RecordingGenerator {
        async fn attempt(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
            self.requests
                .lock()
                .expect("lock should not be poisoned")
                .push(request.clone());
            match self.reply {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::Fail => Err(GenerationError::Backend {
                    backend: "stub".to_string(),
                    details: "503".to_string(),
                }),
            }
        }
    }

    fn options() -> QueryOptions {
        QueryOptions {
            retry_base_delay_ms: 0,
            ..QueryOptions::default()
        }
    }

    fn indexed(text: &str, metadata: DocumentMetadata) -> IndexedDocument {
        IndexedDocument::build(
            Document::new(text, metadata),
            &ChunkingConfig::default(),
            Arc::new(HashedNgramEmbedder::default()),
        )
    }

    const POLICY: &str = "Refunds are issued within fourteen days of a returned item. \
                          Shipping costs are not refundable.";

    #[tokio::test]
    async fn no_document_asks_for_upload() {
        let generator = RecordingGenerator::new(Reply::Text("unused"));
        let router = AnswerRouter::new(generator.clone(), options());

        let answer = router.answer(None, "what is this?").await;

        assert_eq!(answer.text, NO_DOCUMENT_MESSAGE);
        assert_eq!(answer.strategy, AnswerStrategy::NoDocument);
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn image_documents_skip_heuristics() {
        let generator = RecordingGenerator::new(Reply::Text("There are 3 names."));
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed(
            "Name  Status\nAlice  Present",
            DocumentMetadata {
                is_image: true,
                page_count: Some(1),
                ..Default::default()
            },
        );

        let answer = router.answer(Some(&document), "how many pages and present").await;

        assert_eq!(answer.strategy, AnswerStrategy::ImagePrompt);
        assert_eq!(answer.text, "There are 3 names.");
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Extracted Text from Image:\nName  Status"));
        assert_eq!(requests[0].stop, vec!["</s>".to_string(), "<|eot_id|>".to_string()]);
        assert!((requests[0].temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn blank_image_answer_uses_image_message() {
        let generator = RecordingGenerator::new(Reply::Text("  "));
        let router = AnswerRouter::new(generator, options());
        let document = indexed(
            "blurry",
            DocumentMetadata {
                is_image: true,
                ..Default::default()
            },
        );

        let answer = router.answer(Some(&document), "what does it say").await;
        assert_eq!(answer.text, IMAGE_EMPTY_MESSAGE);
    }

    #[tokio::test]
    async fn metadata_shortcut_answers_without_generation() {
        let generator = RecordingGenerator::new(Reply::Text("unused"));
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed(
            POLICY,
            DocumentMetadata {
                page_count: Some(12),
                ..Default::default()
            },
        );

        let answer = router.answer(Some(&document), "How many pages?").await;

        assert_eq!(answer.strategy, AnswerStrategy::MetadataShortcut);
        assert!(answer.text.contains("12"));
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn nouns_hidden_inside_other_words_do_not_trigger_shortcut() {
        let generator = RecordingGenerator::new(Reply::Text("Two passwords are listed."));
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed(
            "Name  Status\nAna  Absent\nBen  Present\nCy  Absent",
            DocumentMetadata {
                row_count: Some(3),
                column_count: Some(2),
                ..Default::default()
            },
        );

        let attendance = router
            .answer(Some(&document), "how many will be absent tomorrow")
            .await;
        assert_eq!(attendance.strategy, AnswerStrategy::StatusCount);
        assert_eq!(attendance.text, "Status summary:\nAbsent: 2");

        let passwords = router
            .answer(Some(&document), "how many passwords are listed")
            .await;
        assert_ne!(passwords.strategy, AnswerStrategy::MetadataShortcut);
        assert_eq!(passwords.strategy, AnswerStrategy::RagGeneral);
    }

    #[tokio::test]
    async fn status_table_is_counted_without_generation() {
        let generator = RecordingGenerator::new(Reply::Text("unused"));
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed(
            "Name   Status\nAlice  Present\nBob  Absent\nCarol  Present",
            DocumentMetadata::default(),
        );

        let answer = router.answer(Some(&document), "how many present and absent").await;

        assert_eq!(answer.strategy, AnswerStrategy::StatusCount);
        assert!(answer.text.contains("Present: 2"));
        assert!(answer.text.contains("Absent: 1"));
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn status_query_without_table_falls_back_to_rag() {
        let generator = RecordingGenerator::new(Reply::Text("Nobody is listed as absent."));
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed(POLICY, DocumentMetadata::default());

        let answer = router.answer(Some(&document), "how many were absent").await;

        assert_eq!(answer.strategy, AnswerStrategy::RagGeneral);
        assert_eq!(answer.text, "Nobody is listed as absent.");
        let requests = generator.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Refunds are issued within fourteen days"));
        assert!(requests[0].prompt.contains(NOT_FOUND_SENTINEL));
        assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn unindexable_document_skips_generation() {
        let generator = RecordingGenerator::new(Reply::Text("unused"));
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed("", DocumentMetadata::default());

        let answer = router.answer(Some(&document), "what is the refund window?").await;

        assert_eq!(answer.text, NOT_INDEXED_MESSAGE);
        assert_eq!(answer.strategy, AnswerStrategy::Unavailable);
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_retrieval_skips_generation() {
        let generator = RecordingGenerator::new(Reply::Text("unused"));
        let router = AnswerRouter::new(
            generator.clone(),
            QueryOptions {
                top_k: 0,
                ..options()
            },
        );
        let document = indexed(POLICY, DocumentMetadata::default());

        let answer = router.answer(Some(&document), "what is the refund window?").await;

        assert_eq!(answer.text, NO_RELEVANT_CONTENT_MESSAGE);
        assert!(generator.requests().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_becomes_temporary_issue() {
        let generator = RecordingGenerator::new(Reply::Fail);
        let router = AnswerRouter::new(generator.clone(), options());
        let document = indexed(POLICY, DocumentMetadata::default());

        let answer = router.answer(Some(&document), "what is the refund window?").await;

        assert_eq!(answer.text, TEMPORARY_ISSUE_MESSAGE);
        assert_eq!(answer.strategy, AnswerStrategy::RagGeneral);
        assert_eq!(generator.requests().len(), 5);
    }

    #[tokio::test]
    async fn blank_rag_answer_is_not_success() {
        let generator = RecordingGenerator::new(Reply::Text("\n"));
        let router = AnswerRouter::new(generator, options());
        let document = indexed(POLICY, DocumentMetadata::default());

        let answer = router.answer(Some(&document), "what is the refund window?").await;
        assert_eq!(answer.text, NO_CLEAR_ANSWER_MESSAGE);
    }

    #[tokio::test]
    async fn session_snapshot_is_used() {
        let generator = RecordingGenerator::new(Reply::Text("unused"));
        let router = AnswerRouter::new(generator, options());
        let session = DocumentSession::default();

        let before = router.answer_in(&session, "how many words").await;
        assert_eq!(before.strategy, AnswerStrategy::NoDocument);

        session.index(Document::from_text("one two three")).await;
        let after = router.answer_in(&session, "how many words").await;
        assert_eq!(after.text, "The document contains 3 words.");
    }
}
