use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::badges::BadgeAllowList;
use crate::model::BadgeCount;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    InvalidUrl(String),
    Status(u16),
    Transport(String),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(reason) => write!(f, "invalid profile url: {reason}"),
            Self::Status(status) => write!(f, "unexpected status code {status}"),
            Self::Transport(reason) => write!(f, "transport error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Counted(u32),
    Failed(FetchFailure),
}

impl FetchOutcome {
    pub fn badge_count(&self) -> BadgeCount {
        match self {
            Self::Counted(count) => BadgeCount::counted(*count),
            Self::Failed(_) => BadgeCount::ERROR,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetcherOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Downloads a public profile page and counts its badges.
///
/// Every failure below this point is folded into [`FetchOutcome::Failed`];
/// nothing is retried.
#[derive(Debug, Clone)]
pub struct ProfileFetcher {
    client: reqwest::Client,
    user_agent: String,
    max_body_bytes: usize,
    allow_list: Arc<BadgeAllowList>,
}

impl ProfileFetcher {
    pub fn new(options: FetcherOptions, allow_list: BadgeAllowList) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build profile http client")?;

        Ok(Self {
            client,
            user_agent: options.user_agent,
            max_body_bytes: options.max_body_bytes,
            allow_list: Arc::new(allow_list),
        })
    }

    pub async fn fetch_badge_count(&self, url: &str) -> BadgeCount {
        self.fetch(url).await.badge_count()
    }

    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        match self.try_fetch(url).await {
            Ok(count) => FetchOutcome::Counted(count),
            Err(failure) => {
                match &failure {
                    FetchFailure::Status(status) => {
                        tracing::warn!(%url, status, "profile fetch returned non-200 status");
                    }
                    other => {
                        tracing::warn!(%url, error = %other, "profile fetch failed");
                    }
                }
                FetchOutcome::Failed(failure)
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<u32, FetchFailure> {
        let url = Url::parse(url.trim()).map_err(|err| FetchFailure::InvalidUrl(err.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchFailure::InvalidUrl(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|err| FetchFailure::Transport(format!("{err:#}")))?;

        if response.status() != StatusCode::OK {
            return Err(FetchFailure::Status(response.status().as_u16()));
        }

        let body = read_body_limited(response, self.max_body_bytes).await?;

        let count = self.allow_list.count_badges(&body);
        tracing::debug!(count, "counted profile badges");
        Ok(count)
    }
}

/// Reads the whole body, giving up once it grows past `limit` bytes.
async fn read_body_limited(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<String, FetchFailure> {
    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| FetchFailure::Transport(format!("read body: {err:#}")))?
    {
        if out.len() + chunk.len() > limit {
            return Err(FetchFailure::Transport(format!(
                "profile body exceeds {limit} bytes"
            )));
        }
        out.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}
