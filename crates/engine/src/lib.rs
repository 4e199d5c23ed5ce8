//! KBQA Engine
//!
//! Resolves a free-text question to knowledge graph entities and relations
//! and renders natural-language answers.
//!
//! # Architecture
//!
//! ```text
//! question ─► Preprocessor ─► LinkerFusion ─► RelationFusion ─► candidates
//!                                 │                                 │
//!                           GraphDriver                     ConstraintMatcher
//!                                                                   │
//!                                          answers ◄─ AnswerGenerator ◄─ Ranker
//! ```
//!
//! Every external model (tokenizer, linkers, extractors, classifiers) is a
//! trait object from [`collaborators`], so deployments choose local or
//! hosted implementations at construction time.

pub mod collaborators;
pub mod graph;
pub mod pipeline;

pub use collaborators::{create_neural_extractor, create_neural_linker};
pub use graph::{create_graph_driver, GraphDriver, InMemoryGraph};
pub use pipeline::{CandidateAnswer, Collaborators, LinkedEntity, ParsedQuestion, QaPipeline};
