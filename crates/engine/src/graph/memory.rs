//! In-memory knowledge graph
//!
//! Adjacency-list graph used for tests and small, static deployments.
//! Edges point from an instance to the category (or facility) it belongs to.

use super::GraphDriver;
use async_trait::async_trait;
use kbqa_common::errors::Result;
use kbqa_common::models::{EntityId, GraphNode};
use std::collections::HashMap;

/// In-memory graph
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    /// All nodes by id
    nodes: HashMap<EntityId, GraphNode>,

    /// Adjacency list: node -> nodes it belongs to
    outgoing: HashMap<EntityId, Vec<EntityId>>,

    /// Reverse adjacency: node -> nodes belonging to it
    incoming: HashMap<EntityId, Vec<EntityId>>,

    /// Name -> ids, in insertion order
    by_name: HashMap<String, Vec<EntityId>>,
}

impl InMemoryGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node
    pub fn add_node(&mut self, node: GraphNode) {
        let ids = self.by_name.entry(node.name.clone()).or_default();
        if !ids.contains(&node.id) {
            ids.push(node.id);
        }
        self.nodes.insert(node.id, node);
    }

    /// Add an edge `child -> parent`
    pub fn add_edge(&mut self, child: EntityId, parent: EntityId) {
        self.outgoing.entry(child).or_default().push(parent);
        self.incoming.entry(parent).or_default().push(child);
    }

    pub fn get(&self, id: EntityId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn find(&self, name: &str, label: &str) -> Option<&GraphNode> {
        self.by_name
            .get(name)?
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|node| node.label.as_str() == label)
    }

    fn neighbors(&self, id: EntityId, reverse: bool) -> &[EntityId] {
        let adjacency = if reverse { &self.incoming } else { &self.outgoing };
        adjacency.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

#[async_trait]
impl GraphDriver for InMemoryGraph {
    async fn get_genres_by_relation(
        &self,
        parent_label: &str,
        instance_label: &str,
        parent_name: &str,
        reverse: bool,
    ) -> Result<Option<Vec<GraphNode>>> {
        let Some(parent) = self.find(parent_name, parent_label) else {
            return Ok(None);
        };

        let instances = self
            .neighbors(parent.id, reverse)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.label.as_str() == instance_label)
            .cloned()
            .collect();

        Ok(Some(instances))
    }

    async fn get_entities_only_by_name(&self, name: &str) -> Result<Vec<GraphNode>> {
        let nodes = self
            .by_name
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).cloned().collect())
            .unwrap_or_default();
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbqa_common::models::NodeLabel;

    fn dining_graph() -> InMemoryGraph {
        let mut graph = InMemoryGraph::new();
        graph.add_node(GraphNode::new(1, "餐饮", NodeLabel::Genre));
        graph.add_node(GraphNode::new(2, "麦当劳", NodeLabel::Instance));
        graph.add_node(GraphNode::new(3, "肯德基", NodeLabel::Instance));
        graph.add_node(GraphNode::new(4, "快餐", NodeLabel::SubGenre));
        graph.add_edge(EntityId(2), EntityId(1));
        graph.add_edge(EntityId(3), EntityId(1));
        graph.add_edge(EntityId(4), EntityId(1));
        graph
    }

    #[tokio::test]
    async fn test_reverse_lookup_returns_instances_only() {
        let graph = dining_graph();

        let instances = graph
            .get_genres_by_relation("Genre", "Instance", "餐饮", true)
            .await
            .unwrap()
            .unwrap();

        let names: Vec<&str> = instances.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["麦当劳", "肯德基"]);
    }

    #[tokio::test]
    async fn test_missing_parent_is_none() {
        let graph = dining_graph();

        let result = graph
            .get_genres_by_relation("SubGenre", "Instance", "餐饮", true)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_forward_lookup_follows_membership() {
        let graph = dining_graph();

        let parents = graph
            .get_genres_by_relation("Instance", "Genre", "麦当劳", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, EntityId(1));
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let graph = dining_graph();
        let nodes = graph.get_entities_only_by_name("肯德基").await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(graph.node_count(), 4);
    }
}
