pub mod promoter;

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use promoter::{promote_due_posts, PromotedPost, Promoter, TickReport};

/// Run the promoter every `period` until the task is aborted.
///
/// Ticks run one at a time; a tick that overruns the period delays the next
/// one rather than stacking. A failed tick is logged and retried on the next
/// interval.
pub fn spawn(promoter: Promoter, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = period.as_secs(), "Scheduled post promoter started");

        loop {
            interval.tick().await;
            match promoter.tick().await {
                Ok(report) if report.promoted > 0 => {
                    tracing::info!(
                        promoted = report.promoted,
                        notified = report.notified,
                        failures = report.notify_failures,
                        "Promoter tick complete"
                    );
                }
                Ok(_) => tracing::debug!("Promoter tick: nothing due"),
                Err(e) => tracing::error!("Promoter tick failed: {:#}", e),
            }
        }
    })
}
