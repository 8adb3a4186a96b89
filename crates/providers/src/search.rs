use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::models::SoundSearchResult;
use crate::service::AudioSearch;
use crate::{read_error, request_failed, ProviderError};

const DEFAULT_API_BASE: &str = "https://freesound.org";
const SEARCH_FIELDS: &str = "id,name,duration,previews,license,username";
const MAX_PAGE_SIZE: usize = 150;

#[derive(Clone, Debug)]
pub struct FreesoundConfig {
    pub api_key: String,
    pub api_base: String,
}

impl FreesoundConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

pub struct FreesoundSearch {
    config: FreesoundConfig,
    client: reqwest::Client,
}

impl FreesoundSearch {
    pub fn new(config: FreesoundConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::configuration("Freesound API key is required."));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| ProviderError::configuration(format!("HTTP client: {err}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl AudioSearch for FreesoundSearch {
    fn name(&self) -> &str {
        "freesound"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SoundSearchResult>, ProviderError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let page_size = limit.clamp(1, MAX_PAGE_SIZE).to_string();
        tracing::info!(target: "providers", "Freesound search {:?} (limit {})", query, page_size);
        let response = self
            .client
            .get(format!(
                "{}/apiv2/search/text/",
                self.config.api_base.trim_end_matches('/')
            ))
            .query(&[
                ("query", query),
                ("fields", SEARCH_FIELDS),
                ("page_size", page_size.as_str()),
                ("token", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|err| request_failed("Freesound", err))?;
        if !response.status().is_success() {
            return Err(read_error("Freesound", response).await);
        }
        let page: SearchPage = response.json().await.map_err(|err| {
            ProviderError::invalid_response(format!("Invalid Freesound response JSON: {err}"))
        })?;
        let results: Vec<SoundSearchResult> = page
            .results
            .into_iter()
            .take(limit)
            .map(SearchHit::into_result)
            .collect();
        tracing::debug!(target: "providers", "Freesound returned {} results", results.len());
        Ok(results)
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: u64,
    name: String,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    previews: HashMap<String, String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

impl SearchHit {
    fn into_result(self) -> SoundSearchResult {
        let preview_url = ["preview-hq-mp3", "preview-lq-mp3", "preview-hq-ogg", "preview-lq-ogg"]
            .iter()
            .find_map(|k| self.previews.get(*k).cloned());
        SoundSearchResult {
            id: self.id,
            name: self.name,
            duration: self.duration,
            preview_url,
            license: self.license,
            username: self.username,
        }
    }
}
