// file: src/classify/mod.rs
// description: classification module exports
// reference: internal module structure

pub mod cache;
pub mod engine;
pub mod glm;
pub mod heuristic;
pub mod response;

pub use cache::{CacheEntry, ClassificationCache};
pub use engine::{ClassificationEngine, CompletionApi};
pub use glm::GlmClient;
pub use heuristic::HeuristicClassifier;
