//! Pull activity source: the fixed-interval sweep timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use super::monitor_loop::MonitorMessage;

/// Spawn a task that sends [`MonitorMessage::ClassifyDue`] every `interval`.
///
/// The first message is sent one full interval after start. The task ends
/// when `cancel` fires or the loop drops its receiver.
#[must_use]
pub fn spawn_sweep_timer(
    tx: mpsc::Sender<MonitorMessage>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("sweep timer cancelled");
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                if tx.send(MonitorMessage::classify_due()).await.is_err() {
                    info!("monitor channel closed; sweep timer stopping");
                    break;
                }
            }
        }
        .instrument(info_span!("sweep_timer")),
    )
}
