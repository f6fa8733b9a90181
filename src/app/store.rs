use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row as _;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::fs;
use tokio::sync::Mutex;

use crate::model::{BadgeCount, LeaderboardEntry};

/// Leaderboard persistence keyed by profile URL.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Inserts the entry, or replaces name and badges of the entry with the
    /// same profile URL.
    async fn upsert(&self, entry: &LeaderboardEntry) -> anyhow::Result<()>;

    /// Every entry in first-insert order.
    async fn list(&self) -> anyhow::Result<Vec<LeaderboardEntry>>;

    fn describe(&self) -> String;

    async fn close(&self) {}
}

/// Opens the store named by `url`.
///
/// Supported: `postgres://` / `postgresql://`, `file://<path>` and
/// `memory://`.
pub async fn open_store(url: &str) -> anyhow::Result<Arc<dyn LeaderboardStore>> {
    let url = url.trim();
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let store = PostgresLeaderboardStore::connect(url)
            .await
            .context("open postgres store")?;
        return Ok(Arc::new(store));
    }
    if let Some(path) = url.strip_prefix("file://") {
        if path.is_empty() {
            anyhow::bail!("file store url must name a path: {url}");
        }
        return Ok(Arc::new(LocalFsLeaderboardStore::new(path)));
    }
    if url == "memory://" || url == "memory" {
        return Ok(Arc::new(InMemoryLeaderboardStore::new()));
    }
    anyhow::bail!("unsupported store url: {url:?}. expected postgres://, file:// or memory://")
}

fn upsert_into(entries: &mut Vec<LeaderboardEntry>, entry: &LeaderboardEntry) {
    match entries
        .iter_mut()
        .find(|existing| existing.profile_url == entry.profile_url)
    {
        Some(existing) => {
            existing.name.clone_from(&entry.name);
            existing.badges = entry.badges;
        }
        None => entries.push(entry.clone()),
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLeaderboardStore {
    entries: Mutex<Vec<LeaderboardEntry>>,
}

impl InMemoryLeaderboardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaderboardStore for InMemoryLeaderboardStore {
    async fn upsert(&self, entry: &LeaderboardEntry) -> anyhow::Result<()> {
        upsert_into(&mut *self.entries.lock().await, entry);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<LeaderboardEntry>> {
        Ok(self.entries.lock().await.clone())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    profile_url: String,
    name: String,
    badges: BadgeCount,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredDocument {
    students: Vec<StoredEntry>,
}

/// Leaderboard kept in a single JSON document, rewritten atomically on every
/// upsert.
#[derive(Debug)]
pub struct LocalFsLeaderboardStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFsLeaderboardStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl LeaderboardStore for LocalFsLeaderboardStore {
    async fn upsert(&self, entry: &LeaderboardEntry) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut doc: StoredDocument = read_json(&self.path)
            .await
            .with_context(|| format!("read: {}", self.path.display()))?
            .unwrap_or_default();

        let now = Utc::now();
        match doc
            .students
            .iter_mut()
            .find(|s| s.profile_url == entry.profile_url)
        {
            Some(existing) => {
                existing.name.clone_from(&entry.name);
                existing.badges = entry.badges;
                existing.updated_at = now;
            }
            None => doc.students.push(StoredEntry {
                profile_url: entry.profile_url.clone(),
                name: entry.name.clone(),
                badges: entry.badges,
                updated_at: now,
            }),
        }

        write_json_atomic(&self.path, &doc)
            .await
            .with_context(|| format!("write: {}", self.path.display()))
    }

    async fn list(&self) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let doc: StoredDocument = read_json(&self.path)
            .await
            .with_context(|| format!("read: {}", self.path.display()))?
            .unwrap_or_default();
        Ok(doc
            .students
            .into_iter()
            .map(|s| LeaderboardEntry {
                name: s.name,
                badges: s.badges,
                profile_url: s.profile_url,
            })
            .collect())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

async fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    fs::write(&tmp_path, &data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

/// Leaderboard in the Postgres `students` table.
#[derive(Debug, Clone)]
pub struct PostgresLeaderboardStore {
    pool: PgPool,
    display_url: String,
}

impl PostgresLeaderboardStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("apply schema migrations")?;

        Ok(Self {
            pool,
            display_url: redact_password(url),
        })
    }
}

#[async_trait]
impl LeaderboardStore for PostgresLeaderboardStore {
    async fn upsert(&self, entry: &LeaderboardEntry) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students (profile_url, name, badges)
            VALUES ($1, $2, $3)
            ON CONFLICT (profile_url) DO UPDATE
            SET name = EXCLUDED.name, badges = EXCLUDED.badges, updated_at = now()
            "#,
        )
        .bind(&entry.profile_url)
        .bind(&entry.name)
        .bind(entry.badges.get())
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert student: {}", entry.profile_url))?;
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<LeaderboardEntry>> {
        let rows = sqlx::query("SELECT name, badges, profile_url FROM students ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("list students")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(LeaderboardEntry {
                name: row.try_get("name")?,
                badges: BadgeCount::from_raw(row.try_get("badges")?),
                profile_url: row.try_get("profile_url")?,
            });
        }
        Ok(entries)
    }

    fn describe(&self) -> String {
        self.display_url.clone()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn redact_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            let _ = url.set_password(Some("***"));
            url.to_string()
        }
        Ok(url) => url.to_string(),
        Err(_) => "postgres://<invalid>".to_string(),
    }
}
