use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::Config;
use crate::error::{ApiError, Result};

const USER_AGENT: &str = concat!("mangadex-reader/", env!("CARGO_PKG_VERSION"));

/// Shared reqwest client with a bounded timeout and a single retry for
/// transient failures.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry_delay: Duration,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            retry_delay: config.retry_delay(),
        })
    }

    /// Sends the request produced by `build`. The builder is invoked again for
    /// the retry because a sent `RequestBuilder` is consumed.
    pub async fn send<F>(&self, endpoint: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        match self.send_once(endpoint, &build).await {
            Err(e) if e.is_transient() => {
                log::warn!("{endpoint}: {e}, retrying once");
                sleep(self.retry_delay).await;
                self.send_once(endpoint, &build).await
            }
            other => other,
        }
    }

    async fn send_once<F>(&self, endpoint: &str, build: &F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = build(&self.client).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status,
            });
        }
        Ok(response)
    }

    pub async fn json<T, F>(&self, endpoint: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send(endpoint, build).await?;
        Ok(response.json::<T>().await?)
    }

    /// Like [`HttpClient::json`] but never retried, for writes that must not
    /// be sent twice.
    pub async fn json_once<T, F>(&self, endpoint: &str, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send_once(endpoint, &build).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url, |c| c.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
