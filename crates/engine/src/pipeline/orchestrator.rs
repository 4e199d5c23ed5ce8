//! Question-answering orchestrator
//!
//! Runs the stages in a fixed order for each question:
//! 1. Preprocess the question
//! 2. Extract constraints
//! 3. Link entities (fusion + taxonomy expansion)
//! 4. Classify list questions
//! 5. Extract relations
//! 6. Assemble candidates
//! 7. Fall back to the root entity when nothing survives
//! 8. Match constraints
//! 9. Rank
//! 10. Render and deduplicate answers

use super::{
    AnswerGenerator, CandidateAnswer, ConstraintMatcher, EntityIndex, Lexicon, LinkedEntity, LinkerFusion,
    ParsedQuestion, Preprocessor, Ranker, RelationCandidate, RelationFusion,
};
use crate::collaborators::{ConstraintExtractor, EntityLinker, ListClassifier, RelationExtractor, RuleLinker, Tokenizer};
use crate::graph::GraphDriver;
use kbqa_common::config::{AppConfig, RootEntityConfig};
use kbqa_common::errors::Result;
use kbqa_common::metrics::{record_answer, record_pipeline_error, record_root_fallback};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Source label of the synthesized root entity
pub const ROOT_SOURCE: &str = "root";

/// Every external collaborator the pipeline needs
#[derive(Clone)]
pub struct Collaborators {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub neural_linker: Arc<dyn EntityLinker>,
    pub dictionary_linker: Arc<dyn EntityLinker>,
    pub rule_linker: Arc<dyn RuleLinker>,
    pub pattern_extractor: Arc<dyn RelationExtractor>,
    pub neural_extractor: Arc<dyn RelationExtractor>,
    pub constraint_extractor: Arc<dyn ConstraintExtractor>,
    pub list_classifier: Arc<dyn ListClassifier>,
    pub graph: Arc<dyn GraphDriver>,
}

/// End-to-end question answering pipeline
pub struct QaPipeline {
    preprocessor: Preprocessor,
    constraint_extractor: Arc<dyn ConstraintExtractor>,
    linker_fusion: LinkerFusion,
    list_classifier: Arc<dyn ListClassifier>,
    relation_fusion: RelationFusion,
    constraint_matcher: ConstraintMatcher,
    ranker: Ranker,
    answer_generator: AnswerGenerator,
    graph: Arc<dyn GraphDriver>,
    link_threshold: f32,
    rel_threshold: f32,
    root: RootEntityConfig,
}

/// Outcome of one run, before metrics
struct Resolution {
    answers: Vec<CandidateAnswer>,
    linked_count: usize,
    is_list: bool,
}

impl QaPipeline {
    pub fn new(collaborators: Collaborators, lexicon: Arc<Lexicon>, config: &AppConfig) -> Self {
        let pipeline = &config.pipeline;

        Self {
            preprocessor: Preprocessor::new(lexicon, collaborators.tokenizer),
            constraint_extractor: collaborators.constraint_extractor.clone(),
            linker_fusion: LinkerFusion::new(
                collaborators.neural_linker,
                collaborators.dictionary_linker,
                collaborators.rule_linker,
                collaborators.graph.clone(),
                pipeline.exempt_subgenres.iter().cloned(),
            ),
            list_classifier: collaborators.list_classifier,
            relation_fusion: RelationFusion::new(
                collaborators.pattern_extractor,
                collaborators.neural_extractor,
                pipeline.neural_boost,
            ),
            constraint_matcher: ConstraintMatcher::new(collaborators.constraint_extractor, pipeline),
            ranker: Ranker::from_config(pipeline),
            answer_generator: AnswerGenerator::new(),
            graph: collaborators.graph,
            link_threshold: pipeline.link_threshold,
            rel_threshold: pipeline.rel_threshold,
            root: config.root.clone(),
        }
    }

    /// Answer a question. An empty list is a valid outcome.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn answer(&self, question: &str) -> Result<Vec<CandidateAnswer>> {
        let start = Instant::now();
        info!("Answering question");

        match self.resolve(question).await {
            Ok(resolution) => {
                record_answer(
                    start.elapsed().as_secs_f64(),
                    resolution.linked_count,
                    resolution.answers.len(),
                    resolution.is_list,
                );

                let texts: Vec<&str> = resolution
                    .answers
                    .iter()
                    .filter_map(|a| a.natural_ans.as_deref())
                    .collect();
                info!(answers = ?texts, "Answers generated");

                Ok(resolution.answers)
            }
            Err(e) => {
                error!(error = %e, code = e.code().as_code(), "Question failed");
                record_pipeline_error(e.code().as_code());
                Err(e)
            }
        }
    }

    async fn resolve(&self, question: &str) -> Result<Resolution> {
        let parsed = self.preprocessor.process(question).await?;

        let constraints = self.constraint_extractor.extract(&parsed.text).await?;
        debug!(constraints = ?constraints, "Constraints extracted");

        let (linked, mut index) = self.linker_fusion.link(&parsed).await?;
        debug!(
            linked = ?linked.iter().take(10).map(|e| (&e.entity.name, e.score)).collect::<Vec<_>>(),
            "Entities linked"
        );

        let is_list = self.list_classifier.check(&parsed.text, &linked).await?;
        debug!(is_list, "List question classified");

        let relations = self.relation_fusion.extract(&parsed, &linked).await?;
        debug!(
            relations = ?relations.iter().take(10).map(|r| (&r.entity_name, &r.rel_name, r.rel_score)).collect::<Vec<_>>(),
            "Relations extracted"
        );

        let mut candidates = self.assemble(is_list, &linked, relations);

        if candidates.is_empty() && self.mentions_root(&parsed) {
            candidates = self.root_fallback(&parsed, &mut index).await?;
        }

        self.constraint_matcher
            .apply(&constraints, &mut candidates, &index)
            .await?;

        let ranked = self.ranker.rank(candidates);
        debug!(ranked = ranked.len(), "Candidates ranked");

        let answers = self.answer_generator.generate(ranked, &index)?;

        Ok(Resolution {
            answers,
            linked_count: linked.len(),
            is_list,
        })
    }

    /// List questions enumerate every linked entity. Otherwise confident
    /// relations are kept, plus confident entities no relation was found for.
    fn assemble(
        &self,
        is_list: bool,
        linked: &[LinkedEntity],
        relations: Vec<RelationCandidate>,
    ) -> Vec<CandidateAnswer> {
        if is_list {
            return linked.iter().map(CandidateAnswer::from_linked).collect();
        }

        let related: HashSet<_> = relations.iter().map(|r| r.id).collect();

        let mut candidates: Vec<CandidateAnswer> = relations
            .into_iter()
            .filter(|r| r.rel_score >= self.rel_threshold && r.link_score >= self.link_threshold)
            .map(CandidateAnswer::from_relation)
            .collect();

        candidates.extend(
            linked
                .iter()
                .filter(|e| !related.contains(&e.id) && e.score >= self.link_threshold)
                .map(CandidateAnswer::from_linked),
        );

        candidates
    }

    fn mentions_root(&self, parsed: &ParsedQuestion) -> bool {
        let keyword = &self.root.trigger_keyword;
        !keyword.is_empty() && parsed.text.contains(keyword.as_str())
    }

    /// Answer from the root facility's own relations, unfiltered
    async fn root_fallback(&self, parsed: &ParsedQuestion, index: &mut EntityIndex) -> Result<Vec<CandidateAnswer>> {
        let nodes = self.graph.get_entities_only_by_name(&self.root.name).await?;
        let Some(node) = nodes.into_iter().next() else {
            warn!(root = %self.root.name, "Root entity not found in graph");
            record_root_fallback(0);
            return Ok(Vec::new());
        };

        let mention = node.name.clone();
        let root = LinkedEntity::new(node, mention, 1.0, ROOT_SOURCE);
        index.insert(root.clone());

        let relations = self.relation_fusion.extract(parsed, std::slice::from_ref(&root)).await?;
        info!(root = %self.root.name, relations = relations.len(), "Root entity fallback");
        record_root_fallback(relations.len());

        Ok(relations.into_iter().map(CandidateAnswer::from_relation).collect())
    }
}
