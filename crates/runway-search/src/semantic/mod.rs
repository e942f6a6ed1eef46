//! Text embedders and vector storage/KNN over the catalog.

mod embed;
mod embedder;
mod hash;
mod model;
pub mod search;

pub use embed::{EmbeddingPipeline, SyncStats, embedding_content_hash, sync_catalog_embeddings};
pub use embedder::{EmbedError, Embedder, embed_checked};
pub use hash::HashEmbedder;
pub use model::{SemanticModel, is_semantic_available};
pub use search::{VectorHit, knn_search};
