use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::store::LeaderboardStore;
use crate::fetch::ProfileFetcher;
use crate::model::LeaderboardEntry;
use crate::roster::{RosterColumns, read_roster};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub students: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// One unit of refresh work, as driven by the scheduler.
#[async_trait]
pub trait RefreshTask: Send + Sync {
    async fn run_refresh(&self) -> anyhow::Result<RefreshSummary>;
}

/// Walks the roster and upserts one leaderboard entry per student.
///
/// Holds no state between cycles; concurrent cycles are allowed and their
/// upserts interleave, last write wins per profile URL.
pub struct Refresher {
    roster_path: PathBuf,
    columns: RosterColumns,
    fetcher: ProfileFetcher,
    store: Arc<dyn LeaderboardStore>,
}

impl Refresher {
    pub fn new(
        roster_path: impl Into<PathBuf>,
        columns: RosterColumns,
        fetcher: ProfileFetcher,
        store: Arc<dyn LeaderboardStore>,
    ) -> Self {
        Self {
            roster_path: roster_path.into(),
            columns,
            fetcher,
            store,
        }
    }

    pub async fn perform_refresh(&self) -> anyhow::Result<RefreshSummary> {
        let started_at = Utc::now();
        tracing::info!(roster = %self.roster_path.display(), "starting data refresh");

        let roster = read_roster(&self.roster_path, &self.columns).context("read roster")?;

        let mut students = 0usize;
        let mut failed = 0usize;
        for record in roster {
            let record = record.context("read roster")?;

            let badges = self.fetcher.fetch_badge_count(&record.profile_url).await;
            if badges.is_error() {
                failed += 1;
            }
            tracing::debug!(
                name = %record.name,
                url = %record.profile_url,
                %badges,
                "scraped profile"
            );

            self.store
                .upsert(&LeaderboardEntry::new(&record, badges))
                .await
                .with_context(|| format!("save student: {}", record.profile_url))?;
            students += 1;
        }

        let summary = RefreshSummary {
            students,
            failed,
            started_at,
            finished_at: Utc::now(),
        };
        tracing::info!(students, failed, "data refresh completed");
        Ok(summary)
    }
}

#[async_trait]
impl RefreshTask for Refresher {
    async fn run_refresh(&self) -> anyhow::Result<RefreshSummary> {
        self.perform_refresh().await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::Path;

    use super::*;
    use crate::app::store::InMemoryLeaderboardStore;
    use crate::badges::BadgeAllowList;
    use crate::fetch::FetcherOptions;
    use crate::model::BadgeCount;

    struct FailingStore;

    #[async_trait]
    impl LeaderboardStore for FailingStore {
        async fn upsert(&self, _entry: &LeaderboardEntry) -> anyhow::Result<()> {
            anyhow::bail!("write rejected")
        }

        async fn list(&self) -> anyhow::Result<Vec<LeaderboardEntry>> {
            Ok(Vec::new())
        }

        fn describe(&self) -> String {
            "failing://".to_string()
        }
    }

    fn refresher(roster: &Path, store: Arc<dyn LeaderboardStore>) -> Refresher {
        let fetcher =
            ProfileFetcher::new(FetcherOptions::default(), BadgeAllowList::default()).unwrap();
        Refresher::new(roster, RosterColumns::default(), fetcher, store)
    }

    #[tokio::test]
    async fn missing_roster_fails_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryLeaderboardStore::new());
        let err = refresher(&dir.path().join("student.csv"), store.clone())
            .perform_refresh()
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("read roster"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_profiles_are_stored_as_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "User Name,Google Cloud Skills Boost Profile URL").unwrap();
        writeln!(file, "Carol,not-a-url").unwrap();
        writeln!(file, "Dan,").unwrap();
        file.flush().unwrap();

        let store = Arc::new(InMemoryLeaderboardStore::new());
        let summary = refresher(file.path(), store.clone())
            .perform_refresh()
            .await
            .unwrap();
        assert_eq!(summary.students, 2);
        assert_eq!(summary.failed, 2);

        let entries = store.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.badges == BadgeCount::ERROR));
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "User Name,Google Cloud Skills Boost Profile URL").unwrap();
        writeln!(file, "Carol,not-a-url").unwrap();
        file.flush().unwrap();

        let err = refresher(file.path(), Arc::new(FailingStore))
            .run_refresh()
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("save student: not-a-url"), "{msg}");
        assert!(msg.contains("write rejected"), "{msg}");
    }
}
