use crate::config::Config;
use crate::error::{Error, Result};
use std::future::Future;
use tracing::warn;

/// Source of raw status documents
pub trait Fetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// What the core sees of a fetch: bytes, or the reason there are none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(Vec<u8>),
    Failed(String),
}

/// Fetch `url`, turning every error into [`FetchOutcome::Failed`]
pub async fn fetch_outcome<F: Fetcher>(fetcher: &F, url: &str) -> FetchOutcome {
    match fetcher.fetch(url).await {
        Ok(bytes) => FetchOutcome::Fetched(bytes),
        Err(e) => {
            warn!(url, error = %e, "fetch failed");
            FetchOutcome::Failed(e.to_string())
        }
    }
}

/// HTTP fetcher for the ILGA FTP mirror
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("{} returned {}", url, status)));
        }
        Ok(response.bytes().await?.to_vec())
    }
}
