use crate::agent::parser::normalize_statement;
use crate::agent::prompt::build_query_prompt;
use crate::error::{Result, ScribeError};
use crate::llm::GenerationClient;
use crate::schema;
use crate::store::{execute_statement, Record, StoreResolver};
use std::sync::Arc;

/// the full query pipeline: inspect schema, render the prompt, call the
/// generation service, gate the output and execute it against the
/// tenant's store. stateless per query; the client and resolver are the
/// only long-lived pieces and are injected at construction.
pub struct QueryPipeline {
    client: Arc<dyn GenerationClient>,
    resolver: StoreResolver,
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// the statement that was executed, sentinel included
    pub sql: String,
    pub results: Vec<Record>,
}

impl QueryPipeline {
    pub fn new(client: Arc<dyn GenerationClient>, resolver: StoreResolver) -> Self {
        Self { client, resolver }
    }

    pub fn resolver(&self) -> &StoreResolver {
        &self.resolver
    }

    #[tracing::instrument(skip(self, request), fields(tenant = %tenant, db = %db_name, llm.client = %self.client.name()))]
    pub async fn run(&self, tenant: &str, db_name: &str, request: &str) -> Result<QueryOutcome> {
        let db_path = self.resolver.resolve(tenant, db_name)?;

        // a guaranteed-absent store is reported upstream, before any
        // generation call is made
        if !db_path.exists() {
            return Err(ScribeError::DatabaseNotFound(db_name.to_string()));
        }

        let schema_path = db_path.clone();
        let schema_text = tokio::task::spawn_blocking(move || schema::schema_context(&schema_path))
            .await
            .map_err(|e| ScribeError::Join(e.to_string()))?;

        let prompt = build_query_prompt(db_name, &schema_text, request);
        tracing::debug!(prompt_len = prompt.len(), "prompt rendered");

        let sql = match self.client.complete(&prompt).await {
            Ok(raw) => normalize_statement(&raw),
            Err(e) => {
                tracing::warn!("generation failed, substituting diagnostic statement: {}", e);
                generation_failure_statement(&e)
            }
        };

        tracing::info!(sql = %sql, "executing generated statement");

        let exec_path = db_path.clone();
        let exec_sql = sql.clone();
        let results = tokio::task::spawn_blocking(move || execute_statement(&exec_path, &exec_sql))
            .await
            .map_err(|e| ScribeError::Join(e.to_string()))??;

        Ok(QueryOutcome { sql, results })
    }
}

// failed generation surfaces as data on the executor's normal path
fn generation_failure_statement(error: &ScribeError) -> String {
    let description = error.to_string().replace('\'', "''");
    format!("SELECT 'Error generating SQL: {}' AS error;", description)
}
