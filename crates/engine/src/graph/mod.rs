//! Graph store abstraction
//!
//! Provides a unified interface for graph backends:
//! - Neo4j (transactional HTTP endpoint)
//! - In-memory adjacency graph

mod memory;
mod neo4j;

pub use memory::InMemoryGraph;
pub use neo4j::Neo4jHttpDriver;

use async_trait::async_trait;
use kbqa_common::config::GraphConfig;
use kbqa_common::errors::{AppError, Result};
use kbqa_common::models::GraphNode;
use std::sync::Arc;

/// Read-only access to the knowledge graph
#[async_trait]
pub trait GraphDriver: Send + Sync {
    /// Nodes labelled `instance_label` related to the `parent_label` node named
    /// `parent_name`. With `reverse` the relation points from the instance to
    /// the parent. `None` when the parent does not exist.
    async fn get_genres_by_relation(
        &self,
        parent_label: &str,
        instance_label: &str,
        parent_name: &str,
        reverse: bool,
    ) -> Result<Option<Vec<GraphNode>>>;

    /// All nodes with exactly this name, any label
    async fn get_entities_only_by_name(&self, name: &str) -> Result<Vec<GraphNode>>;
}

/// Create a graph driver based on configuration
pub fn create_graph_driver(config: &GraphConfig) -> Result<Arc<dyn GraphDriver>> {
    match config.backend.as_str() {
        "neo4j" => Ok(Arc::new(Neo4jHttpDriver::new(config)?)),
        "memory" => Ok(Arc::new(InMemoryGraph::new())),
        other => Err(AppError::Configuration {
            message: format!("Unknown graph backend: {}", other),
        }),
    }
}
