use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;

use crate::fetch::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FetcherOptions};

pub const DEFAULT_STORE_URL: &str = "postgres://localhost:5432/student_leaderboard";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_ROSTER_PATH: &str = "student.csv";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Process configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store_url: String,
    pub port: u16,
    pub roster_path: PathBuf,
    pub refresh_interval: Duration,
    pub fetch_timeout: Duration,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            port: DEFAULT_PORT,
            roster_path: PathBuf::from(DEFAULT_ROSTER_PATH),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            fetch_timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid PORT={raw:?}"))?,
            None => defaults.port,
        };

        Ok(Self {
            store_url: get("BADGEBOARD_STORE_URL").unwrap_or(defaults.store_url),
            port,
            roster_path: get("BADGEBOARD_ROSTER")
                .map(PathBuf::from)
                .unwrap_or(defaults.roster_path),
            refresh_interval: parse_secs(
                "BADGEBOARD_REFRESH_INTERVAL_SECS",
                get("BADGEBOARD_REFRESH_INTERVAL_SECS"),
            )?
            .unwrap_or(defaults.refresh_interval),
            fetch_timeout: parse_secs(
                "BADGEBOARD_FETCH_TIMEOUT_SECS",
                get("BADGEBOARD_FETCH_TIMEOUT_SECS"),
            )?
            .unwrap_or(defaults.fetch_timeout),
            user_agent: get("BADGEBOARD_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }

    pub fn fetcher_options(&self) -> FetcherOptions {
        FetcherOptions {
            user_agent: self.user_agent.clone(),
            timeout: self.fetch_timeout,
            ..FetcherOptions::default()
        }
    }
}

fn parse_secs(key: &str, raw: Option<String>) -> anyhow::Result<Option<Duration>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let secs = raw
        .parse::<u64>()
        .with_context(|| format!("invalid {key}={raw:?}. expected whole seconds"))?;
    if secs == 0 {
        anyhow::bail!("{key} must be greater than zero");
    }
    Ok(Some(Duration::from_secs(secs)))
}
