//! Memory module - the orchestration facade
//!
//! Composes the generation provider with the embedding store, and
//! memoizes query vectors in the cache layer.

pub mod service;

pub use service::MemoryService;
