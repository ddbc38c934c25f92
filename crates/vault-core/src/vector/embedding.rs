use crate::error::{Result, VaultError};
use crate::types::Embedding;

/// Pluggable text embedder.
///
/// Implementations must be deterministic: the same text and dimension
/// always produce the same vector. Callers bound input length before
/// calling. The trait is synchronous; async callers run it on
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text` into a vector of exactly `dim` values.
    fn embed(&self, text: &str, dim: usize) -> Result<Embedding>;

    /// Provider identifier string.
    fn name(&self) -> &str;
}

impl<E: EmbeddingProvider> EmbeddingProvider for std::sync::Arc<E> {
    fn embed(&self, text: &str, dim: usize) -> Result<Embedding> {
        (**self).embed(text, dim)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<E: EmbeddingProvider + ?Sized> EmbeddingProvider for Box<E> {
    fn embed(&self, text: &str, dim: usize) -> Result<Embedding> {
        (**self).embed(text, dim)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Add one signed feature to its bucket.
fn add_feature(vector: &mut [f32], bytes: &[u8]) {
    let hash = fnv1a(bytes);
    let bucket = (hash % vector.len() as u64) as usize;
    vector[bucket] += if hash >> 63 == 0 { 1.0 } else { -1.0 };
}

/// Feature-hashing embedder with no model download.
///
/// Lowercased word tokens are hashed with FNV-1a into signed buckets and
/// the result is L2-normalised. Texts sharing vocabulary land close
/// together; it knows nothing about synonyms.
///
/// Text with no word tokens (`"🚀"`, `"???"`) or whose tokens cancel out
/// is embedded as a single feature of the whole trimmed string, so every
/// non-blank input gets a deterministic unit vector.
#[derive(Debug, Clone, Default)]
pub struct HashEmbeddingProvider;

impl HashEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str, dim: usize) -> Result<Embedding> {
        if dim == 0 {
            return Err(VaultError::InvalidDimension(dim));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(VaultError::Embedding("Nothing to embed".to_string()));
        }

        let mut vector = vec![0.0f32; dim];
        for token in trimmed
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            add_feature(&mut vector, token.to_lowercase().as_bytes());
        }

        if vector.iter().all(|v| *v == 0.0) {
            add_feature(&mut vector, trimmed.to_lowercase().as_bytes());
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        for v in &mut vector {
            *v /= norm;
        }
        Ok(vector)
    }

    fn name(&self) -> &str {
        "hash-fnv1a"
    }
}

#[cfg(feature = "fastembed")]
pub use self::fast::FastEmbedProvider;

#[cfg(feature = "fastembed")]
mod fast {
    use super::EmbeddingProvider;
    use crate::error::{Result, VaultError};
    use crate::types::Embedding;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    /// FastEmbed-based embedding provider
    pub struct FastEmbedProvider {
        model: TextEmbedding,
        model_name: String,
        dimension: usize,
    }

    impl FastEmbedProvider {
        /// Create a provider with the default model
        pub fn new() -> Result<Self> {
            Self::with_model(EmbeddingModel::BGESmallENV15)
        }

        pub fn with_model(model: EmbeddingModel) -> Result<Self> {
            let dimension = match model {
                EmbeddingModel::BGESmallENV15 => 384,
                EmbeddingModel::BGEBaseENV15 => 768,
                EmbeddingModel::BGELargeENV15 => 1024,
                EmbeddingModel::AllMiniLML6V2 => 384,
                EmbeddingModel::AllMiniLML12V2 => 384,
                _ => 384,
            };
            let model_name = format!("{:?}", model);

            let model = TextEmbedding::try_new(InitOptions::new(model))
                .map_err(|e| VaultError::Embedding(format!("Failed to initialize FastEmbed: {}", e)))?;

            Ok(Self {
                model,
                model_name,
                dimension,
            })
        }

        pub fn dimension(&self) -> usize {
            self.dimension
        }
    }

    impl EmbeddingProvider for FastEmbedProvider {
        fn embed(&self, text: &str, dim: usize) -> Result<Embedding> {
            if dim != self.dimension {
                return Err(VaultError::DimensionMismatch {
                    expected: self.dimension,
                    got: dim,
                });
            }

            let embeddings = self
                .model
                .embed(vec![text.to_string()], None)
                .map_err(|e| VaultError::Embedding(format!("Embedding failed: {}", e)))?;

            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| VaultError::Embedding("No embedding generated".to_string()))
        }

        fn name(&self) -> &str {
            &self.model_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::cosine_similarity;
    use std::sync::Arc;

    #[test]
    fn test_hash_embedding_is_deterministic() {
        let provider = HashEmbeddingProvider::new();
        let a = provider.embed("Rust ownership and borrowing", 64).unwrap();
        let b = provider.embed("Rust ownership and borrowing", 64).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hash_embedding_is_normalised() {
        let provider = HashEmbeddingProvider::new();
        let v = provider.embed("one two three four", 32).unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_ignored() {
        let provider = HashEmbeddingProvider::new();
        let a = provider.embed("Graph traversal!", 128).unwrap();
        let b = provider.embed("graph, TRAVERSAL", 128).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let provider = HashEmbeddingProvider::new();
        let query = provider.embed("breadth first graph traversal", 256).unwrap();
        let close = provider.embed("graph traversal with a visited set", 256).unwrap();
        let far = provider.embed("sourdough starter hydration", 256).unwrap();
        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[test]
    fn test_invalid_input() {
        let provider = HashEmbeddingProvider::new();
        assert!(matches!(
            provider.embed("text", 0),
            Err(VaultError::InvalidDimension(0))
        ));
        assert!(matches!(
            provider.embed("   \n ", 16),
            Err(VaultError::Embedding(_))
        ));
    }

    #[test]
    fn test_symbol_only_text_still_embeds() {
        let provider = HashEmbeddingProvider::new();
        let rocket = provider.embed("🚀", 32).unwrap();
        let norm: f32 = rocket.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(rocket, provider.embed("  🚀 ", 32).unwrap());
        assert_ne!(rocket, provider.embed("???", 32).unwrap());
    }

    #[test]
    fn test_arc_forwarding() {
        let provider = Arc::new(HashEmbeddingProvider::new());
        assert_eq!(provider.name(), "hash-fnv1a");
        assert_eq!(provider.embed("hello", 8).unwrap().len(), 8);
    }

    #[cfg(feature = "fastembed")]
    #[test]
    #[ignore] // Requires downloading model
    fn test_fastembed_provider() {
        let provider = FastEmbedProvider::new().unwrap();
        let embedding = provider.embed("This is a test sentence.", 384).unwrap();
        assert_eq!(embedding.len(), 384);
        assert!(provider.embed("wrong size", 12).is_err());
    }
}
