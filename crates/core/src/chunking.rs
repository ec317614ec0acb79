use crate::error::ConfigError;
use crate::models::QueryOptions;

/// Word-window sizes for [`chunk_words`]. Both values count whitespace-delimited words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
        }
    }
}

impl From<&QueryOptions> for ChunkingConfig {
    fn from(value: &QueryOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunkConfig(format!(
                "overlap ({}) must be less than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

/// Slides a `chunk_size`-word window over `text` with stride `chunk_size - overlap`.
///
/// The last windows may be shorter than `chunk_size` and can be contained in the
/// window before them; they are kept so every word is covered at least once.
/// Text without any words yields `vec![String::new()]`, which the index treats
/// as "nothing to index".
pub fn chunk_words(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let words = text.split_whitespace().collect::<Vec<_>>();
    let window = config.chunk_size.max(1);
    let stride = config.stride();

    let chunks = (0..words.len())
        .step_by(stride)
        .map(|start| {
            let end = (start + window).min(words.len());
            words[start..end].join(" ")
        })
        .filter(|chunk| !chunk.trim().is_empty())
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        vec![String::new()]
    } else {
        chunks
    }
}
