use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::config::{ProviderConfig, WireFormat};
use crate::error::FetchError;
use crate::providers::request::RateQuery;

/// Performs one GET against the quote service and hands back the whole
/// body, buffered.
///
/// The connection and response stream are owned by the returned future;
/// dropping it mid-flight tears both down.
#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch(&self, query: &RateQuery) -> Result<Vec<u8>, FetchError>;

    /// Encoding the fetched bodies are in.
    fn format(&self) -> WireFormat;
}

pub struct HttpRateFetcher {
    client: reqwest::Client,
    base_url: String,
    format: WireFormat,
}

impl HttpRateFetcher {
    pub fn new(config: &ProviderConfig) -> Result<Self, FetchError> {
        Self::with_timeout(&config.base_url, config.format, config.timeout())
    }

    pub fn with_timeout(
        base_url: &str,
        format: WireFormat,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("fxsync/0.1")
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(HttpRateFetcher {
            client,
            base_url: base_url.to_string(),
            format,
        })
    }
}

#[async_trait]
impl RateFetcher for HttpRateFetcher {
    #[instrument(name = "RateFetch", skip(self, query), fields(pairs = query.len()))]
    async fn fetch(&self, query: &RateQuery) -> Result<Vec<u8>, FetchError> {
        let url = query.to_url(&self.base_url, self.format)?;
        debug!("Requesting rates from {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Received rate response");
        Ok(body.to_vec())
    }

    fn format(&self) -> WireFormat {
        self.format
    }
}
