//! Scheduled maintenance tasks.

use crate::db::Database;
use crate::entitlements::TrialPolicy;
use crate::rate_limit::RateLimitConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Interval between maintenance runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60); // 1 hour

/// Run all maintenance tasks once.
pub async fn run_cleanup(
    db: &Database,
    trial_policy: TrialPolicy,
    limiters: &RateLimitConfig,
) {
    // Lapsed trials are only persisted as basic when the policy says so.
    if trial_policy == TrialPolicy::Downgrade {
        match db.users().expire_trials(Utc::now()).await {
            Ok(count) if count > 0 => info!("Downgraded {} lapsed trials", count),
            Ok(_) => {}
            Err(e) => error!("Failed to downgrade lapsed trials: {}", e),
        }
    }

    limiters.retain_recent();
    debug!(clients = limiters.tracked_clients(), "Pruned rate limiter buckets");
}

/// Spawn a background task that runs maintenance periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_cleanup_scheduler(
    db: Database,
    trial_policy: TrialPolicy,
    limiters: Arc<RateLimitConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            run_cleanup(&db, trial_policy, &limiters).await;
        }
    })
}
