//! KBQA Common Library
//!
//! Shared code for the question-answering engine including:
//! - Knowledge graph data model
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, ErrorCode, Result};
pub use models::{EntityId, GraphNode, NodeLabel};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
