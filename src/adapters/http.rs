use crate::config::toml_config::ScrapeConfig;
use crate::domain::ports::PageFetcher;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::Duration;

/// reqwest 下載器，失敗時固定間隔重試
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        let accept_language = reqwest::header::HeaderValue::from_str(&config.accept_language)
            .map_err(|e| EtlError::InvalidConfigValueError {
                field: "scrape.accept_language".to_string(),
                value: config.accept_language.clone(),
                reason: e.to_string(),
            })?;
        headers.insert(reqwest::header::ACCEPT_LANGUAGE, accept_language);

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            retry_attempts: config.retry_attempts,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        if url.trim().is_empty() {
            return Err(EtlError::ValidationError {
                message: "Empty URL".to_string(),
            });
        }

        let mut last_error = None;
        for attempt in 0..=self.retry_attempts {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    tracing::debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        self.retry_attempts + 1,
                        url,
                        e
                    );
                    last_error = Some(e);
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EtlError::ScrapeError {
            url: url.to_string(),
            message: "no attempt made".to_string(),
        }))
    }
}
