use anyhow::{Context, Result, bail};
use archive_core::config::FetchConfig;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use std::time::Duration;

/// Single-attempt HTTP access. Failures are reported, never retried.
pub trait Fetch {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;

    fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String> {
        let body = self.fetch(url, timeout)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = &config.referer {
            let value = HeaderValue::from_str(referer).context("invalid referer in config")?;
            headers.insert(REFERER, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .with_context(|| format!("request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {status} for {url}");
        }
        Ok(response.bytes()?.to_vec())
    }
}

pub fn page_timeout(config: &FetchConfig) -> Duration {
    Duration::from_secs(config.timeout_secs)
}

pub fn material_timeout(config: &FetchConfig) -> Duration {
    Duration::from_secs(config.material_timeout_secs)
}
