//! External collaborator interfaces
//!
//! The pipeline never inspects concrete collaborator types: each role is a
//! trait object chosen at construction time. Implementations may be local
//! or networked; every call is awaited to a definite result before the
//! next stage runs.

mod http;
pub mod mock;

pub use http::{HttpEntityLinker, HttpRelationExtractor};

use crate::pipeline::{Constraint, ConstraintMatch, LinkedEntity, ParsedQuestion, RelationCandidate};
use async_trait::async_trait;
use kbqa_common::config::ServicesConfig;
use kbqa_common::errors::{AppError, Result};
use kbqa_common::models::GraphNode;
use std::sync::Arc;

/// Word segmentation with part-of-speech tagging
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Returns tokens and tags of equal length
    async fn pos_cut(&self, text: &str) -> Result<(Vec<String>, Vec<String>)>;
}

/// Entity linker.
///
/// Linkers receive the whole parsed question and read what they need:
/// the neural linker uses the text, the dictionary linker text and tokens,
/// the rule linker text, tokens and tags.
#[async_trait]
pub trait EntityLinker: Send + Sync {
    /// Produced entities carry this linker's source label
    async fn link(&self, question: &ParsedQuestion) -> Result<Vec<LinkedEntity>>;
}

/// Lexical rule linker, the highest-trust linking signal
pub trait RuleLinker: EntityLinker {
    /// Categories that must not be expanded into their instances
    fn is_special_entity(&self, entity: &GraphNode) -> bool;
}

/// Relation extractor for one linked entity.
///
/// The pattern extractor reads tokens, the neural extractor reads text.
#[async_trait]
pub trait RelationExtractor: Send + Sync {
    async fn extract(&self, question: &ParsedQuestion, linked: &LinkedEntity) -> Result<Vec<RelationCandidate>>;

    /// Provenance label appended when this extractor confirms a relation
    fn source(&self) -> &str;
}

/// Constraint extraction and structural matching
#[async_trait]
pub trait ConstraintExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Vec<Constraint>>;

    /// `None` when no constraint applies to this entity
    async fn match_constraint(&self, constraints: &[Constraint], linked: &LinkedEntity) -> Result<Option<ConstraintMatch>>;
}

/// Decides whether a question expects an enumeration
#[async_trait]
pub trait ListClassifier: Send + Sync {
    async fn check(&self, text: &str, linked: &[LinkedEntity]) -> Result<bool>;
}

/// Create the hosted neural entity linker from configuration
pub fn create_neural_linker(config: &ServicesConfig) -> Result<Arc<dyn EntityLinker>> {
    let url = config
        .neural_linker_url
        .as_deref()
        .ok_or_else(|| AppError::Configuration {
            message: "services.neural_linker_url is not set".to_string(),
        })?;
    Ok(Arc::new(HttpEntityLinker::new(url, config.timeout())?))
}

/// Create the hosted neural relation extractor from configuration
pub fn create_neural_extractor(config: &ServicesConfig) -> Result<Arc<dyn RelationExtractor>> {
    let url = config
        .neural_extractor_url
        .as_deref()
        .ok_or_else(|| AppError::Configuration {
            message: "services.neural_extractor_url is not set".to_string(),
        })?;
    Ok(Arc::new(HttpRelationExtractor::new(url, config.timeout())?))
}
