//! Question-answering pipeline
//!
//! Stages, in request order:
//! - Preprocessing (normalization, tokenization, stop-word filtering)
//! - Linker fusion (three entity linkers merged by id, taxonomy expansion)
//! - Relation fusion (pattern + neural relation extractors)
//! - Constraint matching
//! - Ranking
//! - Answer generation (templated sentences, deduplicated)

mod answer_generator;
mod constraint_matcher;
mod linker_fusion;
mod orchestrator;
mod preprocessor;
mod ranker;
mod relation_fusion;

pub use answer_generator::{render_answer, AnswerGenerator};
pub use constraint_matcher::{similarity_ratio, ConstraintMatcher};
pub use linker_fusion::{merge_linked, LinkerFusion};
pub use orchestrator::{Collaborators, QaPipeline};
pub use preprocessor::{Lexicon, Preprocessor};
pub use ranker::Ranker;
pub use relation_fusion::RelationFusion;

use kbqa_common::errors::{AppError, Result};
use kbqa_common::models::{EntityId, GraphNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalized question with aligned tokens and part-of-speech tags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    /// Text after drop/rewrite rules
    pub text: String,

    /// Filtered tokens
    pub tokens: Vec<String>,

    /// POS tags, one per token
    pub tags: Vec<String>,
}

/// Graph entity resolved from a mention in the question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedEntity {
    /// Backing graph node
    pub entity: GraphNode,

    /// Surface form in the question
    pub mention: String,

    /// Graph identifier (same as `entity.id` for linker output)
    pub id: EntityId,

    /// Accumulated link score
    pub score: f32,

    /// Linkers that produced this entity, in contribution order
    pub source: Vec<String>,
}

impl LinkedEntity {
    pub fn new(entity: GraphNode, mention: impl Into<String>, score: f32, source: impl Into<String>) -> Self {
        Self {
            id: entity.id,
            entity,
            mention: mention.into(),
            score,
            source: vec![source.into()],
        }
    }

    /// Sources rendered space-joined, e.g. `"rule neural sub"`
    pub fn source_label(&self) -> String {
        self.source.join(" ")
    }

    pub fn has_source(&self, label: &str) -> bool {
        self.source.iter().any(|s| s == label)
    }

    /// Mention, or the entity name when the linker left it empty
    pub fn mention_or_name(&self) -> &str {
        if self.mention.is_empty() {
            &self.entity.name
        } else {
            &self.mention
        }
    }
}

/// Relation (attribute) of a linked entity that the question asks about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationCandidate {
    pub id: EntityId,
    pub mention: String,
    pub entity_name: String,
    pub link_score: f32,
    pub rel_name: String,
    pub rel_val: String,
    pub rel_score: f32,
    /// Extractors that produced or confirmed the relation
    pub rel_source: Vec<String>,
}

impl RelationCandidate {
    /// Build a candidate for `linked` whose value is read from the entity attributes.
    /// Returns `None` when the entity has no such attribute.
    pub fn from_attribute(linked: &LinkedEntity, rel_name: &str, rel_score: f32, source: &str) -> Option<Self> {
        let rel_val = linked.entity.attribute(rel_name)?;
        Some(Self {
            id: linked.id,
            mention: linked.mention_or_name().to_string(),
            entity_name: linked.entity.name.clone(),
            link_score: linked.score,
            rel_name: rel_name.to_string(),
            rel_val: rel_val.to_string(),
            rel_score,
            rel_source: vec![source.to_string()],
        })
    }
}

/// Qualifier extracted from the question (airline, time of day, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    /// Extracted values; empty when the question carries no such qualifier
    pub value: Vec<String>,
}

impl Constraint {
    pub fn new(name: impl Into<String>, value: Vec<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.iter().all(|v| v.is_empty())
    }

    /// First non-empty value
    pub fn primary_value(&self) -> Option<&str> {
        self.value.iter().map(String::as_str).find(|v| !v.is_empty())
    }
}

/// Per-constraint verdicts from the constraint matcher, in evaluation order
pub type ConstraintMatch = Vec<(String, bool)>;

/// One possible answer to the question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAnswer {
    pub id: EntityId,
    pub mention: String,
    pub entity_name: String,
    pub link_score: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_val: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rel_source: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub constr_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constr_val: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constr_score: Option<f32>,
    /// Every matched (name, value) pair; filled only when `keep_all_matches` is set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_constraints: Vec<(String, String)>,

    pub final_score: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_ans: Option<String>,
}

impl CandidateAnswer {
    /// Whole-entity (enumeration) candidate
    pub fn from_linked(linked: &LinkedEntity) -> Self {
        Self {
            id: linked.id,
            mention: linked.mention_or_name().to_string(),
            entity_name: linked.entity.name.clone(),
            link_score: linked.score,
            rel_name: None,
            rel_val: None,
            rel_score: None,
            rel_source: Vec::new(),
            constr_name: None,
            constr_val: None,
            constr_score: None,
            matched_constraints: Vec::new(),
            final_score: 0.0,
            natural_ans: None,
        }
    }

    /// Single-relation candidate
    pub fn from_relation(relation: RelationCandidate) -> Self {
        Self {
            id: relation.id,
            mention: relation.mention,
            entity_name: relation.entity_name,
            link_score: relation.link_score,
            rel_name: Some(relation.rel_name),
            rel_val: Some(relation.rel_val),
            rel_score: Some(relation.rel_score),
            rel_source: relation.rel_source,
            constr_name: None,
            constr_val: None,
            constr_score: None,
            matched_constraints: Vec::new(),
            final_score: 0.0,
            natural_ans: None,
        }
    }

    pub fn is_enumeration(&self) -> bool {
        self.rel_score.is_none()
    }
}

/// id -> linked entity, rebuilt after fusion and consulted by later stages
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    entries: HashMap<EntityId, LinkedEntity>,
}

impl EntityIndex {
    /// Build from an ordered list; a later duplicate id overwrites an earlier one
    pub fn from_linked(linked: &[LinkedEntity]) -> Self {
        let entries = linked.iter().map(|e| (e.id, e.clone())).collect();
        Self { entries }
    }

    pub fn insert(&mut self, linked: LinkedEntity) {
        self.entries.insert(linked.id, linked);
    }

    pub fn get(&self, id: EntityId) -> Option<&LinkedEntity> {
        self.entries.get(&id)
    }

    /// Lookup that treats a miss as a broken fusion invariant
    pub fn resolve(&self, id: EntityId) -> Result<&LinkedEntity> {
        self.entries
            .get(&id)
            .ok_or(AppError::IndexInconsistency { id })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
