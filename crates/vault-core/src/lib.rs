pub mod types;
pub mod error;
pub mod policy;
pub mod storage;
pub mod vector;
pub mod lifecycle;
pub mod graph;
pub mod events;
pub mod api;

pub use error::{Result, VaultError};
pub use types::*;
pub use policy::{compute_exposure_code, embedding_text};
pub use storage::{EntityStore, MemoryStore};
pub use api::{Discovery, IngestOutcome, SearchQuery, SearchResult, Vault, VaultOptions, VaultStats};
pub use graph::{
    Direction, GraphNode, GraphPath, GraphStats, PathStep, RelationshipGraph, TraversalRequest,
};
#[cfg(feature = "fastembed")]
pub use vector::FastEmbedProvider;
pub use vector::{
    cosine_similarity, EmbeddingProvider, HashEmbeddingProvider, SearchHit, SimilarityIndex,
    VectorFilter, VectorRecord,
};
pub use lifecycle::{
    evaluate, EvolutionOutcome, EvolutionPolicy, EvolutionReport, TierDecision, TransitionKind,
};
pub use events::{ChannelObserver, EventBus, VaultEvent, VaultObserver};
