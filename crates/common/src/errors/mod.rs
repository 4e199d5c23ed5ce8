//! Error types for KBQA
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each collaborator and pipeline stage
//! - Machine-readable error codes
//! - Classification of collaborator failures vs. internal faults

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::EntityId;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    InvalidInput,

    // Collaborator errors (8xxx)
    TokenizerError,
    LinkerError,
    RelationExtractorError,
    ConstraintExtractorError,
    ListClassifierError,
    GraphError,

    // Internal errors (9xxx)
    IndexInconsistency,
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 1001,

            ErrorCode::TokenizerError => 8001,
            ErrorCode::LinkerError => 8002,
            ErrorCode::RelationExtractorError => 8003,
            ErrorCode::ConstraintExtractorError => 8004,
            ErrorCode::ListClassifierError => 8005,
            ErrorCode::GraphError => 8006,

            ErrorCode::IndexInconsistency => 9001,
            ErrorCode::InternalError => 9002,
            ErrorCode::ConfigurationError => 9003,
            ErrorCode::SerializationError => 9004,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    // Collaborator failures
    #[error("Tokenizer error: {message}")]
    Tokenizer { message: String },

    #[error("Entity linker '{linker}' failed: {message}")]
    Linker { linker: String, message: String },

    #[error("Relation extractor '{extractor}' failed: {message}")]
    RelationExtractor { extractor: String, message: String },

    #[error("Constraint extractor error: {message}")]
    ConstraintExtractor { message: String },

    #[error("List-question classifier error: {message}")]
    ListClassifier { message: String },

    #[error("Graph store error: {message}")]
    Graph { message: String },

    // Data inconsistency
    #[error("Entity {id} is missing from the linking index")]
    IndexInconsistency { id: EntityId },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput { .. } => ErrorCode::InvalidInput,
            AppError::Tokenizer { .. } => ErrorCode::TokenizerError,
            AppError::Linker { .. } => ErrorCode::LinkerError,
            AppError::RelationExtractor { .. } => ErrorCode::RelationExtractorError,
            AppError::ConstraintExtractor { .. } => ErrorCode::ConstraintExtractorError,
            AppError::ListClassifier { .. } => ErrorCode::ListClassifierError,
            AppError::Graph { .. } => ErrorCode::GraphError,
            AppError::IndexInconsistency { .. } => ErrorCode::IndexInconsistency,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error came from an external collaborator
    /// (tokenizer, linkers, extractors, classifier, graph store)
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::TokenizerError
                | ErrorCode::LinkerError
                | ErrorCode::RelationExtractorError
                | ErrorCode::ConstraintExtractorError
                | ErrorCode::ListClassifierError
                | ErrorCode::GraphError
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
