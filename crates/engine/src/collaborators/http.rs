//! JSON clients for remotely hosted neural models
//!
//! The models themselves are served elsewhere; these clients only
//! translate between the pipeline types and the service payloads.

use super::{EntityLinker, RelationExtractor};
use crate::pipeline::{LinkedEntity, ParsedQuestion, RelationCandidate};
use async_trait::async_trait;
use kbqa_common::errors::{AppError, Result};
use kbqa_common::models::{EntityId, GraphNode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default source label of the hosted models
pub const NEURAL_SOURCE: &str = "neural";

#[derive(Serialize)]
struct LinkRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    entities: Vec<LinkPrediction>,
}

#[derive(Debug, Deserialize)]
struct LinkPrediction {
    entity: GraphNode,
    #[serde(default)]
    mention: String,
    score: f32,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    text: &'a str,
    entity_id: EntityId,
    entity_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    relations: Vec<RelationPrediction>,
}

#[derive(Debug, Deserialize)]
struct RelationPrediction {
    rel_name: String,
    score: f32,
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &Req,
) -> std::result::Result<Resp, String> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| format!("Request failed: {}", e))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("API error {}: {}", status, body));
    }

    response
        .json()
        .await
        .map_err(|e| format!("Failed to parse response: {}", e))
}

/// Entity linker backed by a hosted neural model (reads the text only)
pub struct HttpEntityLinker {
    client: reqwest::Client,
    url: String,
    source: String,
}

impl HttpEntityLinker {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            source: NEURAL_SOURCE.to_string(),
        })
    }

    fn linked_from(&self, response: LinkResponse) -> Vec<LinkedEntity> {
        response
            .entities
            .into_iter()
            .map(|p| LinkedEntity::new(p.entity, p.mention, p.score, self.source.clone()))
            .collect()
    }
}

#[async_trait]
impl EntityLinker for HttpEntityLinker {
    async fn link(&self, question: &ParsedQuestion) -> Result<Vec<LinkedEntity>> {
        let request = LinkRequest { text: &question.text };
        let response: LinkResponse = post_json(&self.client, &self.url, &request)
            .await
            .map_err(|message| AppError::Linker {
                linker: self.source.clone(),
                message,
            })?;

        Ok(self.linked_from(response))
    }
}

/// Relation extractor backed by a hosted neural model (reads the text only)
pub struct HttpRelationExtractor {
    client: reqwest::Client,
    url: String,
    source: String,
}

impl HttpRelationExtractor {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
            source: NEURAL_SOURCE.to_string(),
        })
    }

    /// Predictions naming an attribute the entity lacks carry no value and are dropped
    fn candidates_from(&self, response: ExtractResponse, linked: &LinkedEntity) -> Vec<RelationCandidate> {
        response
            .relations
            .into_iter()
            .filter_map(|p| {
                let candidate = RelationCandidate::from_attribute(linked, &p.rel_name, p.score, &self.source);
                if candidate.is_none() {
                    debug!(entity = %linked.entity.name, relation = %p.rel_name, "Predicted relation has no value");
                }
                candidate
            })
            .collect()
    }
}

#[async_trait]
impl RelationExtractor for HttpRelationExtractor {
    async fn extract(&self, question: &ParsedQuestion, linked: &LinkedEntity) -> Result<Vec<RelationCandidate>> {
        let request = ExtractRequest {
            text: &question.text,
            entity_id: linked.id,
            entity_name: &linked.entity.name,
        };
        let response: ExtractResponse = post_json(&self.client, &self.url, &request)
            .await
            .map_err(|message| AppError::RelationExtractor {
                extractor: self.source.clone(),
                message,
            })?;

        Ok(self.candidates_from(response, linked))
    }

    fn source(&self) -> &str {
        &self.source
    }
}
