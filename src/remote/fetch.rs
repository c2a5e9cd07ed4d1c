/// HTTP page fetching
///
/// Any network error or non-2xx status becomes `Error::Transport`.
use reqwest::blocking::Client;
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{Error, Result};

/// Fetches the text body of a URL
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Blocking reqwest-based fetcher
pub struct HttpFetcher {
    client: Client,
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout()?)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            delay: config.delay()?,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        debug!(url, "fetching");

        let transport_err = |e: reqwest::Error| Error::Transport {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().map_err(transport_err)?;
        let response = response.error_for_status().map_err(transport_err)?;
        let body = response.text().map_err(transport_err)?;

        // Politeness pause; cache hits never reach this point
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        Ok(body)
    }
}

/// Join a record payload onto an optional base URL
///
/// Payloads that are already absolute URLs are returned unchanged.
pub fn resolve_url(base_url: Option<&str>, payload: &str) -> String {
    let payload = payload.trim();
    if payload.starts_with("http://") || payload.starts_with("https://") {
        return payload.to_string();
    }

    match base_url {
        Some(base) => format!("{}{}", base, payload),
        None => payload.to_string(),
    }
}
