mod embedding;
mod index;

#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedProvider;
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use index::{cosine_similarity, SearchHit, SimilarityIndex, VectorFilter, VectorRecord};
