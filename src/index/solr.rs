//! Solr JSON update client

use super::{IndexClient, IndexDocument, IndexError, IndexResult};
use crate::config::IndexSettings;
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

/// Client for one Solr core, e.g. `http://localhost:8983/solr/golr`
pub struct SolrClient {
    update_url: String,
    http_client: Client,
}

impl SolrClient {
    pub fn new(core_url: &str, settings: &IndexSettings) -> IndexResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            update_url: format!("{}/update", core_url.trim_end_matches('/')),
            http_client,
        })
    }

    pub fn update_url(&self) -> &str {
        &self.update_url
    }

    async fn check(response: Response) -> IndexResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(IndexError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl IndexClient for SolrClient {
    async fn add_batch(&self, docs: &[IndexDocument]) -> IndexResult<()> {
        debug!("Posting {} documents to {}", docs.len(), self.update_url);
        let response = self.http_client.post(&self.update_url).json(docs).send().await?;
        Self::check(response).await
    }

    async fn commit(&self) -> IndexResult<()> {
        let body = serde_json::json!({ "commit": {} });
        let response = self.http_client.post(&self.update_url).json(&body).send().await?;
        Self::check(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_url() {
        let client = SolrClient::new("http://localhost:8983/solr/golr/", &IndexSettings::default()).unwrap();
        assert_eq!(client.update_url(), "http://localhost:8983/solr/golr/update");
    }
}
