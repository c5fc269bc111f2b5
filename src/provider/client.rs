//! Provider Client
//!
//! Lists resource collections over the provider's REST surface. One GET per
//! page: `{endpoint}/{service}/{region}/{collection}` with `maxResults`,
//! `pageToken` and one `filter.<name>=<value>` pair per filter value.

use super::http::ProviderHttpClient;
use crate::resource::{Page, ProviderFilter, ResourceFamily, ResourceLister, ResourceRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

/// Response key holding the continuation cursor
const NEXT_TOKEN_FIELD: &str = "nextPageToken";

/// Provider client bound to one endpoint and region
#[derive(Clone)]
pub struct ProviderClient {
    pub http: ProviderHttpClient,
    endpoint: Url,
    pub region: String,
}

impl ProviderClient {
    pub fn new(endpoint: &str, region: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
        if endpoint.cannot_be_a_base() {
            anyhow::bail!("Endpoint cannot be used as a base URL: {}", endpoint);
        }

        Ok(Self {
            http: ProviderHttpClient::new()?,
            endpoint,
            region: region.to_string(),
        })
    }

    /// Build the list URL for one page
    pub fn list_url(
        &self,
        family: &ResourceFamily,
        filter: &ProviderFilter,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<String> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Endpoint cannot be used as a base URL: {}", self.endpoint))?
            .pop_if_empty()
            .extend([
                family.service.as_str(),
                self.region.as_str(),
                family.collection.as_str(),
            ]);

        let mut query_parts = vec![format!("maxResults={}", page_size)];

        if let Some(token) = cursor {
            query_parts.push(format!("pageToken={}", urlencoding::encode(token)));
        }

        for resource_filter in filter.to_resource_filters(family) {
            let param = format!("filter.{}", resource_filter.param);
            for value in &resource_filter.values {
                query_parts.push(format!(
                    "{}={}",
                    urlencoding::encode(&param),
                    urlencoding::encode(value)
                ));
            }
        }

        url.set_query(Some(&query_parts.join("&")));
        Ok(url.to_string())
    }
}

/// Items under `response_path`; a missing key is an empty page
fn extract_items(response: &Value, response_path: &str) -> Vec<ResourceRecord> {
    response
        .get(response_path)
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().cloned().map(ResourceRecord::new).collect())
        .unwrap_or_default()
}

fn extract_next_token(response: &Value) -> Option<String> {
    response
        .get(NEXT_TOKEN_FIELD)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[async_trait]
impl ResourceLister for ProviderClient {
    async fn list(
        &self,
        family: &ResourceFamily,
        filter: &ProviderFilter,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page> {
        let url = self.list_url(family, filter, page_size, cursor)?;
        let response = self
            .http
            .get(&url)
            .await
            .with_context(|| format!("listing {} failed", family.key))?;

        Ok(Page {
            records: extract_items(&response, &family.response_path),
            next_cursor: extract_next_token(&response),
        })
    }
}
