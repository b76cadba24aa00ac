//! Long-term memory subsystem: Vector Store (C6), Hybrid Retriever (C7),
//! Memory Manager (C8) — spec §4.6–§4.8.

pub mod manager;
pub mod retriever;
pub mod vector_store;

pub use manager::{ContextFlags, ContextRequest, FormatStyle, MemoryManager};
pub use retriever::{HybridRetriever, QueryClassification, RetrievalMode};
pub use vector_store::VectorStore;
