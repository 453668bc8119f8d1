//! One reconciliation pass.
//!
//! The engine owns everything both flavors share: picking fetch windows from
//! the watermark, fetching, normalizing and de-duplicating events, and moving
//! the watermark. What happens to the events afterwards is up to a
//! [`Reconciler`] (command scheduling or relay control).

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::constants::DEFAULT_HORIZON_DAYS;
use crate::error::CalcronResult;
use crate::event::{NormalizedEvent, RemoteEvent};
use crate::merge::merge_events;
use crate::ports::EventSource;
use crate::query::plan_queries;

/// Immutable settings for a [`SchedulingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub calendar_id: String,
    pub horizon: Duration,
    pub lookback: Duration,
}

impl EngineConfig {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        EngineConfig {
            calendar_id: calendar_id.into(),
            horizon: Duration::days(DEFAULT_HORIZON_DAYS),
            lookback: Duration::zero(),
        }
    }

    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }
}

/// Watermark plus whatever a flavor keeps between passes.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger<R> {
    pub last_sync: Option<DateTime<Utc>>,
    pub records: R,
}

/// Flavor-specific half of a pass.
#[async_trait]
pub trait Reconciler: Send + Sync {
    type Records: Clone + Send + Sync + 'static;

    /// Whether a pass may go on with cached data when the event source fails.
    fn tolerates_fetch_failure(&self) -> bool {
        false
    }

    /// Apply freshly fetched events and return the next records.
    async fn reconcile(
        &self,
        records: Self::Records,
        events: Vec<NormalizedEvent>,
        now: NaiveDateTime,
    ) -> CalcronResult<Self::Records>;

    /// Undo everything the records stand for and return empty records.
    async fn reset(&self, records: Self::Records) -> Self::Records;
}

pub struct SchedulingEngine<'a> {
    config: EngineConfig,
    source: &'a dyn EventSource,
    clock: &'a dyn Clock,
}

impl<'a> SchedulingEngine<'a> {
    pub fn new(config: EngineConfig, source: &'a dyn EventSource, clock: &'a dyn Clock) -> Self {
        SchedulingEngine {
            config,
            source,
            clock,
        }
    }

    /// Run one pass and return the ledger to persist.
    ///
    /// The watermark moves to the instant the pass started, so anything
    /// edited while the pass runs is fetched again next time.
    pub async fn run<R: Reconciler>(
        &self,
        ledger: &Ledger<R::Records>,
        reconciler: &R,
    ) -> CalcronResult<Ledger<R::Records>> {
        let sync_start = self.clock.now();
        let now = self.clock.wall_clock(sync_start);

        let queries = plan_queries(
            &self.config.calendar_id,
            sync_start,
            ledger.last_sync,
            self.config.horizon,
            self.config.lookback,
        );

        info!("Submitting query");
        let (events, fetched) = match self.source.fetch(&queries).await {
            Ok(remote) => {
                info!(count = remote.len(), "Query results received");
                (self.normalize_all(remote), true)
            }
            Err(e) if reconciler.tolerates_fetch_failure() => {
                error!(error = %e, "Event source unavailable, not updating local events");
                (Vec::new(), false)
            }
            Err(e) => return Err(e),
        };

        let records = reconciler
            .reconcile(ledger.records.clone(), events, now)
            .await?;

        Ok(Ledger {
            last_sync: if fetched { Some(sync_start) } else { ledger.last_sync },
            records,
        })
    }

    /// Clear the watermark and everything the reconciler tracks.
    pub async fn reset<R: Reconciler>(
        &self,
        ledger: &Ledger<R::Records>,
        reconciler: &R,
    ) -> Ledger<R::Records> {
        Ledger {
            last_sync: None,
            records: reconciler.reset(ledger.records.clone()).await,
        }
    }

    /// Normalize fetched events, skipping malformed ones. The two fetch
    /// queries may overlap, so duplicates collapse to the last copy.
    fn normalize_all(&self, remote: Vec<RemoteEvent>) -> Vec<NormalizedEvent> {
        let normalized = remote.iter().filter_map(|event| match event.normalize(self.clock) {
            Ok(normalized) => {
                debug!(
                    id = %normalized.id,
                    status = ?normalized.status,
                    start = %normalized.start,
                    end = %normalized.end,
                    description = %normalized.description,
                    "Fetched event"
                );
                Some(normalized)
            }
            Err(e) => {
                warn!(error = %e, "Skipping event");
                None
            }
        });

        merge_events(Vec::new(), normalized)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeSource;
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::CalcronError;
    use crate::event::{EventStatus, EventTime};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn at(h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn remote(id: &str, start: &str, end: &str) -> RemoteEvent {
        RemoteEvent {
            id: id.to_string(),
            status: EventStatus::Confirmed,
            start: Some(EventTime::date_time(start)),
            end: Some(EventTime::date_time(end)),
            summary: None,
            description: None,
            updated: None,
        }
    }

    /// Records every batch of events it is handed.
    #[derive(Default)]
    struct Recorder {
        tolerant: bool,
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Reconciler for Recorder {
        type Records = u32;

        fn tolerates_fetch_failure(&self) -> bool {
            self.tolerant
        }

        async fn reconcile(
            &self,
            records: u32,
            events: Vec<NormalizedEvent>,
            _now: NaiveDateTime,
        ) -> CalcronResult<u32> {
            self.seen
                .lock()
                .unwrap()
                .push(events.into_iter().map(|e| e.id).collect());
            Ok(records + 1)
        }

        async fn reset(&self, _records: u32) -> u32 {
            0
        }
    }

    #[tokio::test]
    async fn test_pass_advances_watermark_to_sync_start() {
        let clock = FixedClock::at(at(9, 0));
        let source = FakeSource::returning(vec![remote(
            "e1",
            "2026-03-02T10:00:00Z",
            "2026-03-02T11:00:00Z",
        )]);
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);
        let recorder = Recorder::default();

        let next = engine
            .run(&Ledger { last_sync: None, records: 0 }, &recorder)
            .await
            .unwrap();

        assert_eq!(next.last_sync, Some(at(9, 0).and_utc()));
        assert_eq!(next.records, 1);
        assert_eq!(*recorder.seen.lock().unwrap(), vec![vec!["e1".to_string()]]);
        assert_eq!(source.seen.lock().unwrap()[0].len(), 1);
    }

    #[tokio::test]
    async fn test_pass_skips_malformed_and_collapses_duplicates() {
        let clock = FixedClock::at(at(9, 0));
        let mut broken = remote("bad", "2026-03-02T10:00:00Z", "x");
        broken.end = None;
        let source = FakeSource::returning(vec![
            remote("e1", "2026-03-02T10:00:00Z", "2026-03-02T11:00:00Z"),
            broken,
            remote("e2", "2026-03-02T12:00:00Z", "2026-03-02T13:00:00Z"),
            remote("e1", "2026-03-02T10:00:00Z", "2026-03-02T11:30:00Z"),
        ]);
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);
        let recorder = Recorder::default();

        engine
            .run(&Ledger { last_sync: None, records: 0 }, &recorder)
            .await
            .unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![vec!["e1".to_string(), "e2".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_intolerant_pass() {
        let clock = FixedClock::at(at(9, 0));
        let source = FakeSource::failing();
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);
        let recorder = Recorder::default();

        let result = engine
            .run(&Ledger { last_sync: None, records: 7 }, &recorder)
            .await;

        assert!(matches!(result, Err(CalcronError::Transport(_))));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_watermark_for_tolerant_pass() {
        let clock = FixedClock::at(at(9, 0));
        let source = FakeSource::failing();
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);
        let recorder = Recorder {
            tolerant: true,
            ..Default::default()
        };
        let previous = Some(at(8, 0).and_utc());

        let next = engine
            .run(&Ledger { last_sync: previous, records: 7 }, &recorder)
            .await
            .unwrap();

        assert_eq!(next.last_sync, previous);
        assert_eq!(next.records, 8);
        assert_eq!(*recorder.seen.lock().unwrap(), vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn test_incremental_pass_issues_two_queries() {
        let clock = FixedClock::at(at(9, 0));
        let source = FakeSource::returning(vec![]);
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);

        engine
            .run(
                &Ledger {
                    last_sync: Some(at(8, 0).and_utc()),
                    records: 0,
                },
                &Recorder::default(),
            )
            .await
            .unwrap();

        let seen = source.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].updated_min, Some(at(8, 0).and_utc()));
    }

    #[tokio::test]
    async fn test_reset_clears_watermark() {
        let clock = FixedClock::at(at(9, 0));
        let source = FakeSource::returning(vec![]);
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);

        let next = engine
            .reset(
                &Ledger {
                    last_sync: Some(at(8, 0).and_utc()),
                    records: 5,
                },
                &Recorder::default(),
            )
            .await;

        assert_eq!(next, Ledger { last_sync: None, records: 0 });
        assert!(source.seen.lock().unwrap().is_empty());
    }
}
