pub mod analyzer;
pub mod cloud_api;
pub mod context;
pub mod parse;
pub mod patterns;
pub mod prompts;
pub mod record;

#[cfg(test)]
pub(crate) mod scripted;

pub use analyzer::SchemaAnalyzer;
pub use cloud_api::{AIConfig, AIProvider, AIService, CachedBackend, CompletionBackend, GenerationParams};
pub use context::{SchemaContext, TruncationLimits};
pub use patterns::{PatternAnalyzer, SourceSummary};
pub use record::RecordExt;
