use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Extraction metadata attached to a document.
///
/// Every field is optional because each extractor only knows some of them: a
/// PDF has pages, a spreadsheet has rows and columns, a slide deck has slides.
/// Keys this struct does not model are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_count: Option<u64>,
    /// Text came from OCR over an image; table heuristics do not apply.
    #[serde(default)]
    pub is_image: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A single uploaded document: its extracted text and what the extractor knew about it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub full_text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(full_text: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            full_text: full_text.into(),
            metadata,
        }
    }

    pub fn from_text(full_text: impl Into<String>) -> Self {
        Self::new(full_text, DocumentMetadata::default())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStrategy {
    MetadataShortcut,
    StatusCount,
    ImagePrompt,
    RagGeneral,
    /// Guard tripped before any strategy ran.
    NoDocument,
    /// RAG was selected but the index was null or retrieval came back empty.
    Unavailable,
}

impl fmt::Display for AnswerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnswerStrategy::MetadataShortcut => "metadata_shortcut",
            AnswerStrategy::StatusCount => "status_count",
            AnswerStrategy::ImagePrompt => "image_prompt",
            AnswerStrategy::RagGeneral => "rag_general",
            AnswerStrategy::NoDocument => "no_document",
            AnswerStrategy::Unavailable => "unavailable",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub strategy: AnswerStrategy,
}

impl Answer {
    pub fn new(text: impl Into<String>, strategy: AnswerStrategy) -> Self {
        Self {
            text: text.into(),
            strategy,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub rag: GenerationSettings,
    pub image: GenerationSettings,
    pub image_stop: Vec<String>,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_offset_ms: u64,
    /// Per-attempt ceiling on the generation call; `None` waits indefinitely.
    pub attempt_timeout_secs: Option<u64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: 15,
            rag: GenerationSettings {
                max_tokens: 1_024,
                temperature: 0.1,
            },
            image: GenerationSettings {
                max_tokens: 1_024,
                temperature: 0.3,
            },
            image_stop: vec!["</s>".to_string(), "<|eot_id|>".to_string()],
            retry_max_attempts: 5,
            retry_base_delay_ms: 1_000,
            retry_offset_ms: 0,
            attempt_timeout_secs: None,
        }
    }
}
