use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::app::refresh::RefreshTask;

/// Runs a refresh immediately and then once per `period`, measured from
/// start.
///
/// A failed cycle is logged and the schedule continues.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    pub fn start(task: Arc<dyn RefreshTask>, period: Duration) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // A cycle in progress is left to finish even if shutdown is
                // requested meanwhile.
                match task.run_refresh().await {
                    Ok(summary) => tracing::info!(
                        students = summary.students,
                        failed = summary.failed,
                        "scheduled refresh finished"
                    ),
                    Err(err) => tracing::error!(?err, "scheduled refresh failed"),
                }
            }
            tracing::info!("refresh scheduler stopped");
        });

        tracing::info!(period_secs = period.as_secs(), "refresh scheduler started");
        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Cancels future runs and waits for the current one, if any.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            tracing::error!(?err, "refresh scheduler task panicked");
        }
    }
}
