use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::config::HTTP_TIMEOUT_SECS;

const USER_AGENT: &str = concat!("townhall/", env!("CARGO_PKG_VERSION"));

/// The single HTTP session for one scrape run. Constructed at run start,
/// passed by reference to every component, dropped when the run ends.
#[derive(Debug)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let inner = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build http client")?;

        Ok(Self { inner })
    }

    pub fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .inner
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("request returned error status: {url}"))?;

        response
            .text()
            .with_context(|| format!("failed to read response body: {url}"))
    }

    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .inner
            .get(url)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("request returned error status: {url}"))?;

        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read response body: {url}"))?;

        Ok(bytes.to_vec())
    }

    pub fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .inner
            .get(url)
            .query(query)
            .send()
            .with_context(|| format!("request failed: {url}"))?
            .error_for_status()
            .with_context(|| format!("request returned error status: {url}"))?;

        response
            .json()
            .with_context(|| format!("failed to decode json response: {url}"))
    }
}
