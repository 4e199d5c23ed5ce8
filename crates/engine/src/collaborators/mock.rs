//! Static collaborators
//!
//! Table-driven implementations of every collaborator role, for tests and
//! for wiring the pipeline without hosted models.

use super::{ConstraintExtractor, EntityLinker, ListClassifier, RelationExtractor, RuleLinker, Tokenizer};
use crate::pipeline::{Constraint, ConstraintMatch, LinkedEntity, ParsedQuestion, RelationCandidate};
use async_trait::async_trait;
use kbqa_common::errors::{AppError, Result};
use kbqa_common::models::{EntityId, GraphNode};
use std::collections::{HashMap, HashSet};

/// Tokenizer answering from a fixed table; unknown text is split on whitespace
#[derive(Debug, Clone, Default)]
pub struct StaticTokenizer {
    table: HashMap<String, (Vec<String>, Vec<String>)>,
    fail: bool,
}

impl StaticTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tokenizer whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_entry(mut self, text: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        let tokens = pairs.iter().map(|(t, _)| t.to_string()).collect();
        let tags = pairs.iter().map(|(_, g)| g.to_string()).collect();
        self.table.insert(text.into(), (tokens, tags));
        self
    }
}

#[async_trait]
impl Tokenizer for StaticTokenizer {
    async fn pos_cut(&self, text: &str) -> Result<(Vec<String>, Vec<String>)> {
        if self.fail {
            return Err(AppError::Tokenizer {
                message: "tokenizer unavailable".to_string(),
            });
        }

        if let Some((tokens, tags)) = self.table.get(text) {
            return Ok((tokens.clone(), tags.clone()));
        }

        let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let tags = vec!["x".to_string(); tokens.len()];
        Ok((tokens, tags))
    }
}

/// Linker returning the same entities for every question
#[derive(Debug, Clone)]
pub struct StaticLinker {
    source: String,
    entities: Vec<LinkedEntity>,
}

impl StaticLinker {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: GraphNode, mention: impl Into<String>, score: f32) -> Self {
        let linked = LinkedEntity::new(entity, mention, score, self.source.clone());
        self.entities.push(linked);
        self
    }
}

#[async_trait]
impl EntityLinker for StaticLinker {
    async fn link(&self, _question: &ParsedQuestion) -> Result<Vec<LinkedEntity>> {
        Ok(self.entities.clone())
    }
}

/// Rule linker with a fixed set of non-expandable category names
#[derive(Debug, Clone)]
pub struct StaticRuleLinker {
    inner: StaticLinker,
    special: HashSet<String>,
}

impl StaticRuleLinker {
    pub fn new() -> Self {
        Self {
            inner: StaticLinker::new("rule"),
            special: HashSet::new(),
        }
    }

    pub fn with_entity(mut self, entity: GraphNode, mention: impl Into<String>, score: f32) -> Self {
        self.inner = self.inner.with_entity(entity, mention, score);
        self
    }

    pub fn with_special(mut self, name: impl Into<String>) -> Self {
        self.special.insert(name.into());
        self
    }
}

impl Default for StaticRuleLinker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityLinker for StaticRuleLinker {
    async fn link(&self, question: &ParsedQuestion) -> Result<Vec<LinkedEntity>> {
        self.inner.link(question).await
    }
}

impl RuleLinker for StaticRuleLinker {
    fn is_special_entity(&self, entity: &GraphNode) -> bool {
        self.special.contains(&entity.name)
    }
}

/// Relation extractor keyed by entity id.
/// Relations the entity has no attribute for are skipped.
#[derive(Debug, Clone)]
pub struct StaticRelationExtractor {
    source: String,
    relations: HashMap<EntityId, Vec<(String, f32)>>,
}

impl StaticRelationExtractor {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            relations: HashMap::new(),
        }
    }

    pub fn with_relation(mut self, id: i64, rel_name: impl Into<String>, score: f32) -> Self {
        self.relations
            .entry(EntityId(id))
            .or_default()
            .push((rel_name.into(), score));
        self
    }
}

#[async_trait]
impl RelationExtractor for StaticRelationExtractor {
    async fn extract(&self, _question: &ParsedQuestion, linked: &LinkedEntity) -> Result<Vec<RelationCandidate>> {
        let Some(relations) = self.relations.get(&linked.id) else {
            return Ok(Vec::new());
        };

        Ok(relations
            .iter()
            .filter_map(|(name, score)| RelationCandidate::from_attribute(linked, name, *score, &self.source))
            .collect())
    }

    fn source(&self) -> &str {
        &self.source
    }
}

/// Constraint extractor with fixed constraints and per-entity verdicts
#[derive(Debug, Clone, Default)]
pub struct StaticConstraintExtractor {
    constraints: Vec<Constraint>,
    matches: HashMap<EntityId, ConstraintMatch>,
    failing: HashSet<EntityId>,
}

impl StaticConstraintExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraint(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        let values = values.iter().map(|v| v.to_string()).collect();
        self.constraints.push(Constraint::new(name, values));
        self
    }

    pub fn with_match(mut self, id: i64, verdicts: &[(&str, bool)]) -> Self {
        let verdicts = verdicts.iter().map(|(n, m)| (n.to_string(), *m)).collect();
        self.matches.insert(EntityId(id), verdicts);
        self
    }

    /// Matching against this entity fails
    pub fn with_failure(mut self, id: i64) -> Self {
        self.failing.insert(EntityId(id));
        self
    }
}

#[async_trait]
impl ConstraintExtractor for StaticConstraintExtractor {
    async fn extract(&self, _text: &str) -> Result<Vec<Constraint>> {
        Ok(self.constraints.clone())
    }

    async fn match_constraint(&self, _constraints: &[Constraint], linked: &LinkedEntity) -> Result<Option<ConstraintMatch>> {
        if self.failing.contains(&linked.id) {
            return Err(AppError::ConstraintExtractor {
                message: format!("cannot match constraints against {}", linked.entity.name),
            });
        }
        Ok(self.matches.get(&linked.id).cloned())
    }
}

/// List classifier with a fixed verdict
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedListClassifier(pub bool);

#[async_trait]
impl ListClassifier for FixedListClassifier {
    async fn check(&self, _text: &str, _linked: &[LinkedEntity]) -> Result<bool> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbqa_common::models::NodeLabel;

    fn question(text: &str) -> ParsedQuestion {
        ParsedQuestion {
            text: text.to_string(),
            tokens: Vec::new(),
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_tokenizer_table_and_whitespace_fallback() {
        let tokenizer = StaticTokenizer::new().with_entry("停车场收费", &[("停车场", "n"), ("收费", "v")]);

        let (tokens, tags) = tokio_test::block_on(tokenizer.pos_cut("停车场收费")).unwrap();
        assert_eq!(tokens, vec!["停车场", "收费"]);
        assert_eq!(tags, vec!["n", "v"]);

        let (tokens, tags) = tokio_test::block_on(tokenizer.pos_cut("T1 航站楼")).unwrap();
        assert_eq!(tokens, vec!["T1", "航站楼"]);
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_linkers_stamp_their_source() {
        let node = GraphNode::new(1, "餐饮", NodeLabel::Genre);
        let rule = StaticRuleLinker::new().with_entity(node.clone(), "吃饭", 0.9).with_special("餐饮");

        let linked = tokio_test::block_on(rule.link(&question("哪里吃饭"))).unwrap();

        assert_eq!(linked[0].source, vec!["rule".to_string()]);
        assert!(rule.is_special_entity(&node));
    }

    #[test]
    fn test_constraint_verdicts_by_entity() {
        let extractor = StaticConstraintExtractor::new()
            .with_constraint("航司", &["东航"])
            .with_match(1, &[("航司", true)])
            .with_failure(2);
        let first = LinkedEntity::new(GraphNode::new(1, "东航柜台", NodeLabel::Instance), "", 1.0, "rule");
        let second = LinkedEntity::new(GraphNode::new(2, "南航柜台", NodeLabel::Instance), "", 1.0, "rule");
        let third = LinkedEntity::new(GraphNode::new(3, "国航柜台", NodeLabel::Instance), "", 1.0, "rule");
        let constraints = tokio_test::block_on(extractor.extract("")).unwrap();

        let verdict = tokio_test::block_on(extractor.match_constraint(&constraints, &first)).unwrap();
        assert_eq!(verdict, Some(vec![("航司".to_string(), true)]));
        assert!(tokio_test::block_on(extractor.match_constraint(&constraints, &second)).is_err());
        assert!(tokio_test::block_on(extractor.match_constraint(&constraints, &third)).unwrap().is_none());
    }
}
