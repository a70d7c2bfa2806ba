//! Transports yielding raw response bodies for scrape requests.
//!
//! A transport only moves bytes; turning them into typed records is the
//! parser's job. `HttpTransport` talks to the live source, while
//! `DirectoryTransport` serves previously saved days from disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ScrapeError;
use super::types::ScrapeRequest;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Something that turns a request into a raw response body.
pub trait Transport {
    type Request;

    /// Fetch the raw body for `request`.
    async fn stream(&self, request: &Self::Request) -> Result<String, ScrapeError>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the delay source
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpConfig {
    /// Create a new config with the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Fetches one day of delays over HTTP.
///
/// Requests `GET {base_url}/delays/{YYYY-MM-DD}?lang={code}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, request: &ScrapeRequest) -> Result<String, ScrapeError> {
        let date = request.date.ok_or(ScrapeError::MissingDate)?;
        Ok(format!("{}/delays/{}", self.base_url, date.format("%Y-%m-%d")))
    }
}

impl Transport for HttpTransport {
    type Request = ScrapeRequest;

    async fn stream(&self, request: &ScrapeRequest) -> Result<String, ScrapeError> {
        let url = self.url(request)?;
        debug!(%url, language = %request.language, "requesting delays");

        let response = self
            .http
            .get(&url)
            .query(&[("lang", request.language.code())])
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScrapeError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScrapeError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response.text().await?)
    }
}

/// Serves saved days from a directory.
///
/// Expects files named `{YYYY-MM-DD}.json`. A date without a file is a day
/// with no recorded delays and yields an empty list.
#[derive(Debug, Clone)]
pub struct DirectoryTransport {
    dir: PathBuf,
}

impl DirectoryTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, request: &ScrapeRequest) -> Result<PathBuf, ScrapeError> {
        let date = request.date.ok_or(ScrapeError::MissingDate)?;
        Ok(self.dir.join(format!("{}.json", date.format("%Y-%m-%d"))))
    }
}

impl Transport for DirectoryTransport {
    type Request = ScrapeRequest;

    async fn stream(&self, request: &ScrapeRequest) -> Result<String, ScrapeError> {
        let path = self.path_for(request)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved data for date");
                Ok("[]".to_string())
            }
            Err(source) => Err(ScrapeError::Io { path, source }),
        }
    }
}
