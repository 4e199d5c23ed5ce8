//! Relation extractor fusion
//!
//! Pattern results are the base; a neural prediction either confirms
//! pattern results with the same relation name (boosting them) or is
//! kept as an independent candidate.

use super::{LinkedEntity, ParsedQuestion, RelationCandidate};
use crate::collaborators::RelationExtractor;
use kbqa_common::errors::Result;
use std::sync::Arc;
use tracing::debug;

/// Relation fusion stage
pub struct RelationFusion {
    pattern: Arc<dyn RelationExtractor>,
    neural: Arc<dyn RelationExtractor>,

    /// Added to a pattern result confirmed by the neural extractor
    boost: f32,
}

impl RelationFusion {
    pub fn new(pattern: Arc<dyn RelationExtractor>, neural: Arc<dyn RelationExtractor>, boost: f32) -> Self {
        Self { pattern, neural, boost }
    }

    /// Extract relations for every entity, in entity order
    pub async fn extract(&self, question: &ParsedQuestion, linked: &[LinkedEntity]) -> Result<Vec<RelationCandidate>> {
        let mut relations = Vec::new();

        for entity in linked {
            let pattern = self.pattern.extract(question, entity).await?;
            let neural = self.neural.extract(question, entity).await?;

            debug!(
                entity = %entity.entity.name,
                pattern = pattern.len(),
                neural = neural.len(),
                "Relation extractor results"
            );

            relations.extend(self.merge(pattern, neural));
        }

        Ok(relations)
    }

    fn merge(&self, mut pattern: Vec<RelationCandidate>, neural: Vec<RelationCandidate>) -> Vec<RelationCandidate> {
        let source = self.neural.source();
        let mut unmatched = Vec::new();

        for prediction in neural {
            let mut matched = false;
            for candidate in pattern.iter_mut().filter(|c| c.rel_name == prediction.rel_name) {
                candidate.rel_score += self.boost;
                if !candidate.rel_source.iter().any(|s| s == source) {
                    candidate.rel_source.push(source.to_string());
                }
                matched = true;
            }

            if !matched {
                unmatched.push(prediction);
            }
        }

        pattern.extend(unmatched);
        pattern
    }
}
