//! Neo4j HTTP transactional endpoint client

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::cypher::{Statement, first_statement};
use super::{GraphOp, GraphQuery, GraphStore, Label, Node, Record};
use crate::config::GraphConfig;

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<ResultRow>,
}

#[derive(Debug, Deserialize)]
struct ResultRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

/// Graph store backed by Neo4j's `/db/{database}/tx/commit` endpoint
#[derive(Debug, Clone)]
pub struct Neo4jClient {
    http: reqwest::Client,
    commit_url: String,
    username: String,
    password: String,
}

impl Neo4jClient {
    pub fn new(http: reqwest::Client, config: &GraphConfig) -> Self {
        let commit_url = format!(
            "{}/db/{}/tx/commit",
            config.uri.trim_end_matches('/'),
            urlencoding::encode(&config.database)
        );
        Self {
            http,
            commit_url,
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    /// Run statements in one implicit transaction and return their results
    async fn commit(&self, statements: &[Statement]) -> Result<Vec<StatementResult>> {
        let body = json!({ "statements": statements });

        let response = self
            .http
            .post(&self.commit_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .context("Neo4j request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!("Neo4j returned {}: {}", status, text);
            bail!("Neo4j returned {}: {}", status, text);
        }

        let parsed: CommitResponse = response
            .json()
            .await
            .context("Invalid Neo4j response body")?;

        // The endpoint answers 200 with errors in the body; the transaction is rolled back
        if let Some(error) = parsed.errors.first() {
            log::error!("Neo4j error {}: {}", error.code, error.message);
            bail!(
                "Neo4j error {} ({} total): {}",
                error.code,
                parsed.errors.len(),
                error.message
            );
        }

        Ok(parsed.results)
    }

    async fn single(&self, statement: Statement) -> Result<StatementResult> {
        self.commit(std::slice::from_ref(&statement))
            .await?
            .into_iter()
            .next()
            .context("Neo4j returned no result for the statement")
    }
}

fn to_records(result: StatementResult) -> Vec<Record> {
    result
        .data
        .into_iter()
        .map(|row| {
            let mut record = Map::new();
            for (column, value) in result.columns.iter().zip(row.row) {
                record.insert(column.clone(), value);
            }
            record
        })
        .collect()
}

#[async_trait]
impl GraphStore for Neo4jClient {
    async fn first(&self, label: Label, property: &str, value: &str) -> Result<Option<Node>> {
        let result = self
            .single(first_statement(label, property, value))
            .await
            .with_context(|| format!("Lookup of {} by {} failed", label, property))?;

        let node = result
            .data
            .into_iter()
            .next()
            .and_then(|row| row.row.into_iter().next())
            .and_then(|value| match value {
                Value::Object(properties) => Some(Node::new(properties)),
                _ => None,
            });
        Ok(node)
    }

    async fn query(&self, query: &GraphQuery) -> Result<Vec<Record>> {
        let result = self
            .single(query.to_statement())
            .await
            .with_context(|| format!("Query failed: {:?}", query))?;
        Ok(to_records(result))
    }

    async fn batch(&self, ops: &[GraphOp]) -> Result<()> {
        if ops.is_empty() {
            log::debug!("No graph writes to submit");
            return Ok(());
        }

        let statements: Vec<Statement> = ops.iter().map(GraphOp::to_statement).collect();
        self.commit(&statements)
            .await
            .with_context(|| format!("Graph batch of {} statements failed", ops.len()))?;
        log::debug!("Committed {} graph statements", ops.len());
        Ok(())
    }
}
