//! Entity linker fusion
//!
//! Combines the three linkers into one ordered entity list:
//! - The rule linker seeds the fused map (highest trust)
//! - Neural, then dictionary results are merged by id
//! - Category entities are expanded into their direct instances
//! - The result is stably sorted by accumulated score

use super::{EntityIndex, LinkedEntity, ParsedQuestion};
use crate::collaborators::{EntityLinker, RuleLinker};
use crate::graph::GraphDriver;
use kbqa_common::errors::Result;
use kbqa_common::models::{EntityId, NodeLabel};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Source label appended to entities produced by taxonomy expansion
pub const EXPANSION_SOURCE: &str = "sub";

/// Merge one linker's record into an existing fused record.
///
/// Scores accumulate only when `incoming` brings a source label not yet
/// recorded; otherwise `existing` is returned unchanged.
pub fn merge_linked(existing: &LinkedEntity, incoming: &LinkedEntity) -> LinkedEntity {
    let new_labels: Vec<&String> = incoming
        .source
        .iter()
        .filter(|label| !existing.has_source(label))
        .collect();

    if new_labels.is_empty() {
        return existing.clone();
    }

    let mut merged = existing.clone();
    merged.score += incoming.score;
    merged.source.extend(new_labels.into_iter().cloned());
    merged
}

/// Ordered id-keyed map: seed from `seed`, then merge each batch left to right
fn fuse(seed: Vec<LinkedEntity>, batches: Vec<Vec<LinkedEntity>>) -> Vec<LinkedEntity> {
    let mut fused: Vec<LinkedEntity> = Vec::with_capacity(seed.len());
    let mut positions: HashMap<EntityId, usize> = HashMap::new();

    for linked in seed {
        match positions.get(&linked.id) {
            Some(&pos) => fused[pos] = linked,
            None => {
                positions.insert(linked.id, fused.len());
                fused.push(linked);
            }
        }
    }

    for linked in batches.into_iter().flatten() {
        match positions.get(&linked.id) {
            Some(&pos) => fused[pos] = merge_linked(&fused[pos], &linked),
            None => {
                positions.insert(linked.id, fused.len());
                fused.push(linked);
            }
        }
    }

    fused
}

fn sort_by_score(linked: &mut [LinkedEntity]) {
    linked.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Linker fusion stage
pub struct LinkerFusion {
    neural: Arc<dyn EntityLinker>,
    dictionary: Arc<dyn EntityLinker>,
    rule: Arc<dyn RuleLinker>,
    graph: Arc<dyn GraphDriver>,

    /// Sub-genres treated as leaves
    exempt_subgenres: HashSet<String>,
}

impl LinkerFusion {
    pub fn new(
        neural: Arc<dyn EntityLinker>,
        dictionary: Arc<dyn EntityLinker>,
        rule: Arc<dyn RuleLinker>,
        graph: Arc<dyn GraphDriver>,
        exempt_subgenres: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            neural,
            dictionary,
            rule,
            graph,
            exempt_subgenres: exempt_subgenres.into_iter().collect(),
        }
    }

    /// Link, fuse, expand and sort. Returns the ordered entities and their index.
    pub async fn link(&self, question: &ParsedQuestion) -> Result<(Vec<LinkedEntity>, EntityIndex)> {
        let neural = self.neural.link(question).await?;
        let dictionary = self.dictionary.link(question).await?;
        let rule = self.rule.link(question).await?;

        debug!(
            neural = neural.len(),
            dictionary = dictionary.len(),
            rule = rule.len(),
            "Linker results"
        );

        let fused = fuse(rule, vec![neural, dictionary]);
        let mut linked = self.expand(fused).await?;
        sort_by_score(&mut linked);

        let index = EntityIndex::from_linked(&linked);
        Ok((linked, index))
    }

    /// Replace category entities by their direct instances
    async fn expand(&self, fused: Vec<LinkedEntity>) -> Result<Vec<LinkedEntity>> {
        let mut expanded = Vec::with_capacity(fused.len());

        for linked in fused {
            let label = &linked.entity.label;
            let is_exempt =
                *label == NodeLabel::SubGenre && self.exempt_subgenres.contains(&linked.entity.name);

            if *label == NodeLabel::Instance || is_exempt {
                expanded.push(linked);
                continue;
            }

            if !label.is_category() {
                debug!(entity = %linked.entity.name, label = %label, "Dropping entity with unknown label");
                continue;
            }

            if self.rule.is_special_entity(&linked.entity) {
                debug!(entity = %linked.entity.name, "Special category is not expanded");
                continue;
            }

            let instances = self
                .graph
                .get_genres_by_relation(label.as_str(), NodeLabel::Instance.as_str(), &linked.entity.name, true)
                .await?
                .unwrap_or_default();

            debug!(category = %linked.entity.name, instances = instances.len(), "Category expanded");

            for instance in instances {
                let mention = if linked.mention.is_empty() {
                    instance.name.clone()
                } else {
                    linked.mention.clone()
                };
                let mut source = linked.source.clone();
                if !source.iter().any(|s| s == EXPANSION_SOURCE) {
                    source.push(EXPANSION_SOURCE.to_string());
                }

                expanded.push(LinkedEntity {
                    id: instance.id,
                    entity: instance,
                    mention,
                    score: linked.score,
                    source,
                });
            }
        }

        Ok(expanded)
    }
}
