const DEFAULT: usize = 384;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

const WORD_WEIGHT: f32 = 2.0;
const BIGRAM_WEIGHT: f32 = 1.5;
const TRIGRAM_WEIGHT: f32 = 1.0;

/// Turns text into a fixed-length vector. Implementations must be deterministic.
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Vec<f32>;

    fn embed_batch(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Feature-hashing embedder over lowercased words, word bigrams and character trigrams.
///
/// Needs no model files or network, so the same input always lands on the
/// same unit vector. Shared vocabulary between a query and a chunk is what
/// drives similarity; it does not capture synonyms.
#[derive(Debug, Clone, Copy)]
pub struct HashedNgramEmbedder {
    pub dimensions: usize,
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for HashedNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let words = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>();

        if words.is_empty() {
            return vector;
        }

        for word in &words {
            add_feature(&mut vector, b'w', word, WORD_WEIGHT);

            let padded = format!(" {word} ").chars().collect::<Vec<_>>();
            for window in padded.windows(3) {
                let token = window.iter().collect::<String>();
                add_feature(&mut vector, b't', &token, TRIGRAM_WEIGHT);
            }
        }

        for pair in words.windows(2) {
            add_feature(&mut vector, b'b', &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn add_feature(vector: &mut [f32], namespace: u8, token: &str, weight: f32) {
    let hash = fnv1a(namespace, token);
    let bucket = (hash % vector.len() as u64) as usize;
    // The top bit picks a sign so colliding features partly cancel instead of piling up.
    if hash >> 63 == 0 {
        vector[bucket] += weight;
    } else {
        vector[bucket] -= weight;
    }
}

fn fnv1a(namespace: u8, token: &str) -> u64 {
    let mut hash = 1469598103934665603u64;
    for byte in std::iter::once(namespace).chain(token.bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

/// Scales `vector` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for value in vector.iter_mut() {
            *value /= magnitude;
        }
    }
}
