//! Neo4j graph driver over the transactional HTTP endpoint
//!
//! Each lookup is one auto-commit transaction:
//! `POST {url}/db/{database}/tx/commit`.

use super::GraphDriver;
use async_trait::async_trait;
use kbqa_common::config::GraphConfig;
use kbqa_common::errors::{AppError, Result};
use kbqa_common::models::{EntityId, GraphNode, NodeLabel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Node properties that are structural rather than attributes
const RESERVED_PROPERTIES: &[&str] = &["name", "neoId", "entity_label"];

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: Vec<TxStatement<'a>>,
}

#[derive(Serialize)]
struct TxStatement<'a> {
    statement: String,
    parameters: Map<String, Value>,
    #[serde(rename = "resultDataContents")]
    result_data_contents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

/// Neo4j HTTP client
pub struct Neo4jHttpDriver {
    client: reqwest::Client,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl Neo4jHttpDriver {
    /// Create a new driver from configuration
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Graph {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    async fn run(&self, statement: String, parameters: Map<String, Value>) -> Result<Vec<Vec<Value>>> {
        debug!(statement = %statement, "Running Cypher statement");

        let request = TxRequest {
            statements: vec![TxStatement {
                statement,
                parameters,
                result_data_contents: ["row"],
            }],
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(ref username) = self.username {
            builder = builder.basic_auth(username, self.password.as_ref());
        }

        let response = builder.send().await.map_err(|e| AppError::Graph {
            message: format!("Request failed: {}", e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Graph {
                message: format!("Neo4j error {}: {}", status, body),
            });
        }

        let body: TxResponse = response.json().await.map_err(|e| AppError::Graph {
            message: format!("Failed to parse response: {}", e),
        })?;

        rows(body)
    }
}

#[async_trait]
impl GraphDriver for Neo4jHttpDriver {
    async fn get_genres_by_relation(
        &self,
        parent_label: &str,
        instance_label: &str,
        parent_name: &str,
        reverse: bool,
    ) -> Result<Option<Vec<GraphNode>>> {
        let pattern = if reverse {
            format!("(n:{})-->(p)", checked_label(instance_label)?)
        } else {
            format!("(p)-->(n:{})", checked_label(instance_label)?)
        };
        let statement = format!(
            "MATCH (p:{} {{name: $name}}) OPTIONAL MATCH {} RETURN id(p), n, id(n)",
            checked_label(parent_label)?,
            pattern
        );

        let mut parameters = Map::new();
        parameters.insert("name".to_string(), Value::String(parent_name.to_string()));

        let rows = self.run(statement, parameters).await?;
        if rows.is_empty() {
            return Ok(None);
        }

        let mut instances = Vec::new();
        for row in rows {
            match (row.get(1), row.get(2)) {
                (Some(Value::Null), _) | (None, _) => continue,
                (Some(props), Some(id)) => instances.push(node_from_row(props, id, instance_label)?),
                (Some(_), None) => {
                    return Err(AppError::Graph {
                        message: "Row is missing the node id column".to_string(),
                    })
                }
            }
        }

        Ok(Some(instances))
    }

    async fn get_entities_only_by_name(&self, name: &str) -> Result<Vec<GraphNode>> {
        let statement = "MATCH (n {name: $name}) RETURN n, id(n), labels(n)[0]".to_string();
        let mut parameters = Map::new();
        parameters.insert("name".to_string(), Value::String(name.to_string()));

        self.run(statement, parameters)
            .await?
            .iter()
            .map(|row| match row.as_slice() {
                [props, id, label, ..] => node_from_row(props, id, label.as_str().unwrap_or_default()),
                _ => Err(AppError::Graph {
                    message: format!("Unexpected row shape: {:?}", row),
                }),
            })
            .collect()
    }
}

/// Labels are spliced into Cypher text, so only identifiers are accepted
fn checked_label(label: &str) -> Result<&str> {
    let valid = !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(label)
    } else {
        Err(AppError::InvalidInput {
            message: format!("Invalid node label: {:?}", label),
        })
    }
}

fn rows(response: TxResponse) -> Result<Vec<Vec<Value>>> {
    if let Some(err) = response.errors.first() {
        return Err(AppError::Graph {
            message: format!("{}: {}", err.code, err.message),
        });
    }

    Ok(response
        .results
        .into_iter()
        .flat_map(|result| result.data)
        .map(|data| data.row)
        .collect())
}

/// Convert a property map plus `id(n)` into a node.
/// The `entity_label` property, when present, overrides the query label.
fn node_from_row(props: &Value, id: &Value, label: &str) -> Result<GraphNode> {
    let props = props.as_object().ok_or_else(|| AppError::Graph {
        message: format!("Expected node properties, got {}", props),
    })?;
    let id = id.as_i64().ok_or_else(|| AppError::Graph {
        message: format!("Expected integer node id, got {}", id),
    })?;

    let name = props.get("name").and_then(Value::as_str).unwrap_or_default();
    let label = props
        .get("entity_label")
        .and_then(Value::as_str)
        .unwrap_or(label);

    let attributes: BTreeMap<String, String> = props
        .iter()
        .filter(|(key, _)| !RESERVED_PROPERTIES.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), property_text(value)))
        .collect();

    Ok(GraphNode {
        id: EntityId(id),
        name: name.to_string(),
        label: NodeLabel::from(label),
        attributes,
    })
}

fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(property_text).collect::<Vec<_>>().join("、"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_validation() {
        assert!(checked_label("SubGenre").is_ok());
        assert!(checked_label("Instance_2").is_ok());
        assert!(checked_label("").is_err());
        assert!(checked_label("Genre) DETACH DELETE (x").is_err());
    }

    #[test]
    fn test_node_from_row_splits_reserved_properties() {
        let props = json!({
            "name": "国航值机柜台",
            "entity_label": "Instance",
            "neoId": 99,
            "地点": "F3 出发层",
            "航司代码": "CA",
            "楼层": 3
        });

        let node = node_from_row(&props, &json!(99), "Genre").unwrap();

        assert_eq!(node.id, EntityId(99));
        assert_eq!(node.name, "国航值机柜台");
        assert_eq!(node.label, NodeLabel::Instance);
        assert_eq!(node.attribute("楼层"), Some("3"));
        assert!(node.attribute("neoId").is_none());
        assert_eq!(node.attributes.len(), 3);
    }

    #[test]
    fn test_errors_in_response_surface() {
        let response: TxResponse = serde_json::from_value(json!({
            "results": [],
            "errors": [{"code": "Neo.ClientError.Statement.SyntaxError", "message": "bad"}]
        }))
        .unwrap();

        let err = rows(response).unwrap_err();
        assert!(err.to_string().contains("SyntaxError"));
    }

    #[test]
    fn test_rows_are_flattened() {
        let response: TxResponse = serde_json::from_value(json!({
            "results": [{"columns": ["id(p)", "n", "id(n)"], "data": [
                {"row": [1, {"name": "a"}, 2], "meta": []},
                {"row": [1, null, null], "meta": []}
            ]}],
            "errors": []
        }))
        .unwrap();

        let rows = rows(response).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[1][1].is_null());
    }
}
