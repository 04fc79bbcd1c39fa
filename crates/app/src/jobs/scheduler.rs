use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, warn};

use crate::jobs::JobError;

const RETRY_DELAY: Duration = Duration::from_secs(30);

/// Runs `job` immediately and then every `interval_duration`. A failed run
/// is retried once after a short delay before waiting for the next tick.
pub async fn run_interval<F, Fut>(
    name: &'static str,
    interval_duration: Duration,
    mut job: F,
) -> Result<(), JobError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), JobError>>,
{
    let mut ticker = interval(interval_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        debug!(job = name, "job tick");
        if let Err(err) = job().await {
            warn!(error = %err, job = name, "job execution failed, retrying");
            sleep(RETRY_DELAY).await;
            if let Err(err) = job().await {
                warn!(error = %err, job = name, "job retry failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::manifest_cache::{ManifestError, RebuildError};
    use d2builds_infra::manifest::SourceError;

    #[tokio::test(start_paused = true)]
    async fn runs_on_each_tick() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let job = tokio::spawn(run_interval("count", Duration::from_secs(60), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        tokio::time::sleep(Duration::from_secs(150)).await;
        job.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_is_retried_after_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let job = tokio::spawn(run_interval("fail", Duration::from_secs(600), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(JobError::Manifest(ManifestError::from(RebuildError::Source(
                    SourceError::MissingData("Response"),
                ))))
            }
        }));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        job.abort();
    }
}
