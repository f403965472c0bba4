use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Receiving half of the shutdown signal shared by all background loops.
pub type Shutdown = watch::Receiver<bool>;

/// Returns the trigger and a receiver that can be cloned into each loop.
pub fn shutdown_channel() -> (watch::Sender<bool>, Shutdown) {
    watch::channel(false)
}

/// Runs `job` immediately and then once per `period` until shutdown is
/// signalled. A job always finishes before the next one starts; ticks missed
/// while a job was running are not replayed back to back.
pub async fn run_every<F, Fut>(name: &'static str, period: Duration, mut shutdown: Shutdown, mut job: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(task = name, period_secs = period.as_secs(), "Background task started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => job().await,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    // every sender is gone, nothing can stop us cleanly any more
                    break;
                }
            }
        }
    }

    tracing::info!(task = name, "Background task stopped");
}
