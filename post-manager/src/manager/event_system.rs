/*!
Interval-driven events that trigger periodic reconcile and refresh runs
*/

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_stream::{wrappers::IntervalStream, Stream, StreamExt};
use tracing::{debug, info};

use crate::manager::config::ReconcileConfig;

/// Events emitted by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Time to replay the delete queue
    ReconcileDue { tick: u64 },
    /// Time to reconcile and re-fetch the whole collection
    RefreshDue { tick: u64 },
}

pub struct ReconcileScheduler {
    period: Duration,
    refresh_every: u32,
}

impl ReconcileScheduler {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            period: config.interval(),
            refresh_every: config.refresh_every,
        }
    }

    fn event_for(&self, tick: u64) -> SessionEvent {
        if self.refresh_every > 0 && tick % u64::from(self.refresh_every) == 0 {
            SessionEvent::RefreshDue { tick }
        } else {
            SessionEvent::ReconcileDue { tick }
        }
    }

    /// Endless stream of events. The first one fires after a full period;
    /// ticks missed while a slow run was in progress are skipped, not queued.
    pub fn start(self) -> impl Stream<Item = SessionEvent> {
        info!(
            "Scheduling reconcile every {:?} (refresh every {} ticks)",
            self.period, self.refresh_every
        );

        let start = tokio::time::Instant::now() + self.period;
        let mut ticker = tokio::time::interval_at(start, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(ticker);

        async_stream::stream! {
            let mut tick: u64 = 0;
            while ticks.next().await.is_some() {
                tick += 1;
                let event = self.event_for(tick);
                debug!("Scheduler emitted {:?}", event);
                yield event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(interval_ms: u64, refresh_every: u32) -> ReconcileScheduler {
        ReconcileScheduler::new(&ReconcileConfig {
            interval_ms,
            refresh_every,
            ..ReconcileConfig::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn emits_reconcile_events_on_interval() {
        let events: Vec<_> = scheduler(1_000, 0).start().take(3).collect().await;

        assert_eq!(
            events,
            vec![
                SessionEvent::ReconcileDue { tick: 1 },
                SessionEvent::ReconcileDue { tick: 2 },
                SessionEvent::ReconcileDue { tick: 3 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_nth_tick_is_a_refresh() {
        let events: Vec<_> = scheduler(10, 2).start().take(4).collect().await;

        assert_eq!(
            events,
            vec![
                SessionEvent::ReconcileDue { tick: 1 },
                SessionEvent::RefreshDue { tick: 2 },
                SessionEvent::ReconcileDue { tick: 3 },
                SessionEvent::RefreshDue { tick: 4 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_event_waits_a_full_period() {
        let begin = tokio::time::Instant::now();
        let mut events = Box::pin(scheduler(5_000, 0).start());

        events.next().await;

        assert!(begin.elapsed() >= Duration::from_millis(5_000));
    }
}
