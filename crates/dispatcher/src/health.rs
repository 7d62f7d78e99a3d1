//! Health aggregation and the polling task

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use contracts::{HealthReport, HealthSnapshot};

use crate::handle::DistributorHandle;

/// Read every distributor's health concurrently
///
/// A failed read becomes an `Error` snapshot for that distributor instead of
/// failing the report.
pub async fn collect_report(handles: &[Arc<DistributorHandle>]) -> HealthReport {
    let reads = handles.iter().map(|handle| async move {
        match handle.instance().health().await {
            Ok(mut snapshot) => {
                snapshot.name = handle.name().to_string();
                snapshot.enabled = handle.is_active();
                snapshot
            }
            Err(e) => {
                warn!(distributor = %handle.name(), error = %e, "Health read failed");
                let mut snapshot = HealthSnapshot::unavailable(handle.name(), e.to_string());
                snapshot.enabled = handle.is_active();
                snapshot
            }
        }
    });

    HealthReport::from_snapshots(join_all(reads).await)
}

/// Spawn a periodic task
///
/// The first tick fires one `period` after spawning. Ticks never overlap:
/// a tick that runs long skips the missed ones. `tick` returning `None`
/// ends the task.
pub fn spawn_poller<F, Fut>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> Option<Fut> + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match tick() {
                Some(fut) => fut.await,
                None => {
                    debug!("Health poller owner dropped, stopping");
                    break;
                }
            }
        }
    })
}
