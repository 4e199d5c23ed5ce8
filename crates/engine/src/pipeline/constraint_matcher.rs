//! Constraint matching
//!
//! Adjusts candidate scores against the qualifiers extracted from the
//! question. Structural verdicts come from the constraint extractor; when
//! it has no verdict, constraint values are compared with the entity name.
//! A failing match is recovered per candidate.

use super::{CandidateAnswer, Constraint, ConstraintMatch, EntityIndex, LinkedEntity};
use crate::collaborators::ConstraintExtractor;
use kbqa_common::config::PipelineConfig;
use kbqa_common::errors::Result;
use kbqa_common::metrics::record_constraint_match_error;
use std::sync::Arc;
use tracing::{debug, warn};

/// 0-100 indel similarity of two strings, `2 * lcs / (len_a + len_b)` rounded.
///
/// Counted in chars; an empty side scores 0.
pub fn similarity_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    // single-row longest common subsequence
    let mut row = vec![0usize; b.len() + 1];
    for ca in &a {
        let mut diagonal = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb { diagonal + 1 } else { above.max(row[j]) };
            diagonal = above;
        }
    }

    let lcs = row[b.len()];
    (200.0 * lcs as f64 / (a.len() + b.len()) as f64).round() as u8
}

/// Constraint matching stage
pub struct ConstraintMatcher {
    extractor: Arc<dyn ConstraintExtractor>,
    match_bonus: f32,
    miss_penalty: f32,
    fuzzy_link_penalty: f32,
    fuzzy_ratio_threshold: u8,
    keep_all_matches: bool,
    fuzzy_on_match_error: bool,
}

impl ConstraintMatcher {
    pub fn new(extractor: Arc<dyn ConstraintExtractor>, config: &PipelineConfig) -> Self {
        Self {
            extractor,
            match_bonus: config.constraint_match_bonus,
            miss_penalty: config.constraint_miss_penalty,
            fuzzy_link_penalty: config.fuzzy_link_penalty,
            fuzzy_ratio_threshold: config.fuzzy_ratio_threshold,
            keep_all_matches: config.keep_all_matches,
            fuzzy_on_match_error: config.fuzzy_on_match_error,
        }
    }

    /// Whether any constraint carries a value
    pub fn applies(constraints: &[Constraint]) -> bool {
        constraints.iter().any(|c| !c.is_empty())
    }

    /// Score every candidate in place.
    ///
    /// Fails only when a candidate id is missing from the index.
    pub async fn apply(
        &self,
        constraints: &[Constraint],
        candidates: &mut [CandidateAnswer],
        index: &EntityIndex,
    ) -> Result<()> {
        if !Self::applies(constraints) {
            return Ok(());
        }

        for candidate in candidates.iter_mut() {
            let linked = index.resolve(candidate.id)?;
            candidate.constr_score = Some(0.0);

            let verdicts = match self.extractor.match_constraint(constraints, linked).await {
                Ok(verdicts) => verdicts,
                Err(e) => {
                    warn!(
                        error = %e,
                        constraints = ?constraints,
                        entity = %linked.entity.name,
                        id = %linked.id,
                        "Constraint matching failed"
                    );
                    record_constraint_match_error();
                    if self.fuzzy_on_match_error {
                        self.score_fuzzy(candidate, constraints);
                    }
                    continue;
                }
            };

            match verdicts {
                Some(verdicts) if !verdicts.is_empty() => {
                    self.score_verdicts(candidate, &verdicts, constraints, linked)
                }
                _ => self.score_fuzzy(candidate, constraints),
            }

            debug!(
                entity = %candidate.entity_name,
                constr_score = ?candidate.constr_score,
                link_score = candidate.link_score,
                "Constraints applied"
            );
        }

        Ok(())
    }

    /// Each hit adds the bonus and overwrites the recorded pair; each miss adds the penalty
    fn score_verdicts(
        &self,
        candidate: &mut CandidateAnswer,
        verdicts: &ConstraintMatch,
        constraints: &[Constraint],
        linked: &LinkedEntity,
    ) {
        let mut score = candidate.constr_score.unwrap_or(0.0);

        for (name, matched) in verdicts {
            if !*matched {
                score += self.miss_penalty;
                continue;
            }

            score += self.match_bonus;
            let value = linked
                .entity
                .attribute(name)
                .or_else(|| {
                    constraints
                        .iter()
                        .find(|c| &c.name == name)
                        .and_then(Constraint::primary_value)
                })
                .unwrap_or_default()
                .to_string();

            if self.keep_all_matches {
                candidate.matched_constraints.push((name.clone(), value.clone()));
            }
            candidate.constr_name = Some(name.clone());
            candidate.constr_val = Some(value);
        }

        candidate.constr_score = Some(score);
    }

    fn score_fuzzy(&self, candidate: &mut CandidateAnswer, constraints: &[Constraint]) {
        let mut score = candidate.constr_score.unwrap_or(0.0);

        for value in constraints.iter().filter_map(Constraint::primary_value) {
            if similarity_ratio(value, &candidate.entity_name) >= self.fuzzy_ratio_threshold {
                candidate.link_score -= self.fuzzy_link_penalty;
            } else {
                score += self.miss_penalty;
            }
        }

        candidate.constr_score = Some(score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::mock::StaticConstraintExtractor;
    use kbqa_common::errors::AppError;
    use kbqa_common::models::{EntityId, GraphNode, NodeLabel};

    fn counter(id: i64, name: &str, code: &str) -> LinkedEntity {
        let entity = GraphNode::new(id, name, NodeLabel::Instance)
            .with_attribute("航司", code)
            .with_attribute("地点", "F3");
        LinkedEntity::new(entity, "值机柜台", 0.9, "rule")
    }

    fn setup(entities: &[LinkedEntity]) -> (Vec<CandidateAnswer>, EntityIndex) {
        let candidates = entities.iter().map(CandidateAnswer::from_linked).collect();
        (candidates, EntityIndex::from_linked(entities))
    }

    fn matcher(extractor: StaticConstraintExtractor, keep_all: bool) -> ConstraintMatcher {
        let config = PipelineConfig {
            keep_all_matches: keep_all,
            ..PipelineConfig::default()
        };
        ConstraintMatcher::new(Arc::new(extractor), &config)
    }

    fn fuzzy_on_error_matcher(extractor: StaticConstraintExtractor) -> ConstraintMatcher {
        let config = PipelineConfig {
            fuzzy_on_match_error: true,
            ..PipelineConfig::default()
        };
        ConstraintMatcher::new(Arc::new(extractor), &config)
    }

    async fn constraints(extractor: &StaticConstraintExtractor) -> Vec<Constraint> {
        extractor.extract("").await.unwrap()
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity_ratio("东航", "东航"), 100);
        assert_eq!(similarity_ratio("东航", "南航"), 50);
        assert_eq!(similarity_ratio("东航", "东航柜台"), 67);
        assert_eq!(similarity_ratio("东航值机", "南航服务台"), 22);
        assert_eq!(similarity_ratio("", "南航"), 0);
    }

    #[tokio::test]
    async fn test_short_value_inside_entity_name_is_fuzzy_hit() {
        let extractor = StaticConstraintExtractor::new().with_constraint("航司", &["东航"]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航柜台", "MU")]);

        matcher(extractor, false).apply(&constraints, &mut candidates, &index).await.unwrap();

        assert!((candidates[0].link_score - 0.6).abs() < 1e-6);
        assert_eq!(candidates[0].constr_score, Some(0.0));
    }

    #[tokio::test]
    async fn test_empty_constraints_are_ignored() {
        let extractor = StaticConstraintExtractor::new().with_constraint("航司", &[""]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航值机柜台", "MU")]);

        matcher(extractor, false).apply(&constraints, &mut candidates, &index).await.unwrap();

        assert!(candidates[0].constr_score.is_none());
    }

    #[tokio::test]
    async fn test_verdicts_adjust_constraint_score() {
        let extractor = StaticConstraintExtractor::new()
            .with_constraint("航司", &["东航"])
            .with_constraint("楼层", &["三楼"])
            .with_match(1, &[("航司", true), ("楼层", false)]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航值机柜台", "MU")]);

        matcher(extractor, false).apply(&constraints, &mut candidates, &index).await.unwrap();

        let candidate = &candidates[0];
        assert!((candidate.constr_score.unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(candidate.constr_name.as_deref(), Some("航司"));
        assert_eq!(candidate.constr_val.as_deref(), Some("MU"));
        assert!(candidate.matched_constraints.is_empty());
    }

    #[tokio::test]
    async fn test_last_match_wins_and_all_matches_kept() {
        let extractor = StaticConstraintExtractor::new()
            .with_constraint("航司", &["东航"])
            .with_constraint("时段", &["早上"])
            .with_match(1, &[("航司", true), ("时段", true)]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航值机柜台", "MU")]);

        matcher(extractor, true).apply(&constraints, &mut candidates, &index).await.unwrap();

        let candidate = &candidates[0];
        assert!((candidate.constr_score.unwrap() - 0.6).abs() < 1e-6);
        assert_eq!(candidate.constr_name.as_deref(), Some("时段"));
        // the entity has no such attribute, so the extracted value is kept
        assert_eq!(candidate.constr_val.as_deref(), Some("早上"));
        assert_eq!(
            candidate.matched_constraints,
            vec![("航司".to_string(), "MU".to_string()), ("时段".to_string(), "早上".to_string())]
        );
    }

    #[tokio::test]
    async fn test_fuzzy_fallback_without_verdicts() {
        let extractor = StaticConstraintExtractor::new().with_constraint("航司", &["东航值机"]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航值机柜台", "MU"), counter(2, "南航服务台", "CZ")]);

        matcher(extractor, false).apply(&constraints, &mut candidates, &index).await.unwrap();

        // similar name: link score penalized
        assert!((candidates[0].link_score - 0.6).abs() < 1e-6);
        assert_eq!(candidates[0].constr_score, Some(0.0));
        // dissimilar name: constraint score penalized
        assert!((candidates[1].link_score - 0.9).abs() < 1e-6);
        assert!((candidates[1].constr_score.unwrap() + 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_failing_match_is_recovered_per_candidate() {
        let extractor = StaticConstraintExtractor::new()
            .with_constraint("航司", &["东航"])
            .with_failure(1)
            .with_match(2, &[("航司", true)]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航值机柜台", "MU"), counter(2, "东航服务台", "MU")]);

        matcher(extractor, false).apply(&constraints, &mut candidates, &index).await.unwrap();

        assert_eq!(candidates[0].constr_score, Some(0.0));
        assert!((candidates[0].link_score - 0.9).abs() < 1e-6);
        assert!((candidates[1].constr_score.unwrap() - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_failing_match_falls_back_to_fuzzy_when_enabled() {
        let extractor = StaticConstraintExtractor::new()
            .with_constraint("航司", &["东航"])
            .with_failure(1)
            .with_failure(2);
        let constraints = constraints(&extractor).await;
        let (mut candidates, index) = setup(&[counter(1, "东航柜台", "MU"), counter(2, "南航服务台", "CZ")]);

        fuzzy_on_error_matcher(extractor)
            .apply(&constraints, &mut candidates, &index)
            .await
            .unwrap();

        assert!((candidates[0].link_score - 0.6).abs() < 1e-6);
        assert_eq!(candidates[0].constr_score, Some(0.0));
        assert!((candidates[1].link_score - 0.9).abs() < 1e-6);
        assert!((candidates[1].constr_score.unwrap() + 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_missing_index_entry_is_fatal() {
        let extractor = StaticConstraintExtractor::new().with_constraint("航司", &["东航"]);
        let constraints = constraints(&extractor).await;
        let (mut candidates, _) = setup(&[counter(1, "东航值机柜台", "MU")]);

        let err = matcher(extractor, false)
            .apply(&constraints, &mut candidates, &EntityIndex::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::IndexInconsistency { id } if id == EntityId(1)));
    }
}
