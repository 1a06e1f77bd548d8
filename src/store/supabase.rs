use reqwest::blocking::{Client, RequestBuilder, Response};

use super::{InteractionSource, VectorSink};
use crate::config::StoreConfig;
use crate::error::{PipelineError, Result};
use crate::types::{ExportRecord, RawInteraction};

/// PostgREST client for the hosted store. Built per stage and dropped with it.
pub struct SupabaseStore {
    client: Client,
    config: StoreConfig,
}

impl SupabaseStore {
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::store("build http client", e))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    fn check(operation: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(PipelineError::store(operation, format!("HTTP {status}: {}", body.trim())))
    }
}

impl InteractionSource for SupabaseStore {
    fn fetch_interactions(&self) -> Result<Vec<RawInteraction>> {
        let operation = format!("select from {}", self.config.interactions_table);
        let request = self
            .client
            .get(format!("{}?select=*", self.table_url(&self.config.interactions_table)));
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| PipelineError::store(&operation, e))?;
        Self::check(&operation, response)?
            .json::<Vec<RawInteraction>>()
            .map_err(|e| PipelineError::store(&operation, e))
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.config.interactions_table, self.config.url)
    }
}

impl VectorSink for SupabaseStore {
    fn upsert_embeddings(&self, records: &[ExportRecord]) -> Result<()> {
        let operation = format!("upsert into {}", self.config.embeddings_table);
        let request = self
            .client
            .post(format!(
                "{}?on_conflict={}",
                self.table_url(&self.config.embeddings_table),
                self.config.upsert_key
            ))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records);
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| PipelineError::store(&operation, e))?;
        Self::check(&operation, response)?;
        Ok(())
    }
}
