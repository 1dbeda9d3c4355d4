//! Wrench RAG crate - knowledge retrieval for the support chat.
//!
//! Embedding and search are pluggable backends. The retriever runs both
//! through the failover executor, each on its own provider chain, and
//! returns knowledge atoms ranked by similarity.

pub mod atom;
pub mod backend;
pub mod embedding;
pub mod error;
pub mod index;
pub mod retriever;

pub use atom::{KnowledgeAtom, ScoredAtom};
pub use backend::{EmbeddingBackend, KnowledgeSearch};
pub use embedding::HashEmbedding;
pub use error::RetrievalError;
pub use index::KnowledgeIndex;
pub use retriever::{augment_query, RagRetriever};
