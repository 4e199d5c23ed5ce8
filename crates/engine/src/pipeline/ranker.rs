//! Candidate ranking

use super::CandidateAnswer;
use kbqa_common::config::PipelineConfig;

/// Composite-score ranker
#[derive(Debug, Clone)]
pub struct Ranker {
    /// Answers kept after sorting
    pub max_answers: usize,

    /// Optional floor on `final_score`; disabled by default
    pub min_final_score: Option<f32>,
}

impl Default for Ranker {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl Ranker {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_answers: config.max_answers,
            min_final_score: config.min_final_score,
        }
    }

    /// Score, stably sort descending, filter and truncate
    pub fn rank(&self, mut candidates: Vec<CandidateAnswer>) -> Vec<CandidateAnswer> {
        for candidate in &mut candidates {
            candidate.final_score = candidate.constr_score.unwrap_or(0.0)
                + candidate.link_score
                + candidate.rel_score.unwrap_or(0.0);
        }

        candidates.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));

        if let Some(floor) = self.min_final_score {
            candidates.retain(|c| c.final_score >= floor);
        }

        candidates.truncate(self.max_answers);
        candidates
    }
}
