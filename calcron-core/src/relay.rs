//! Relay flavor: one binary actuator that is on while any event runs.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::engine::Reconciler;
use crate::error::CalcronResult;
use crate::event::NormalizedEvent;
use crate::merge::{merge_events, prune_events};
use crate::ports::{Actuator, RelayState};

/// On iff a non-cancelled event is running at `now`.
pub fn desired_state(events: &[NormalizedEvent], now: NaiveDateTime) -> RelayState {
    events
        .iter()
        .any(|event| !event.is_cancelled() && event.covers(now))
        .into()
}

/// Drive the relay on `pin` to the state the events ask for.
///
/// Only writes when the current position differs. Returns the position after
/// the call.
pub async fn update_relay(
    actuator: &dyn Actuator,
    pin: u32,
    events: &[NormalizedEvent],
    now: NaiveDateTime,
) -> CalcronResult<RelayState> {
    let current = actuator.read(pin).await?;
    let desired = desired_state(events, now);

    if current == desired {
        return Ok(current);
    }

    let after = actuator.write(pin, desired).await?;
    info!(pin, %now, "turned relay {after}");
    Ok(after)
}

pub struct RelayReconciler<'a> {
    pin: u32,
    actuator: &'a dyn Actuator,
}

impl<'a> RelayReconciler<'a> {
    pub fn new(pin: u32, actuator: &'a dyn Actuator) -> Self {
        RelayReconciler { pin, actuator }
    }
}

#[async_trait]
impl Reconciler for RelayReconciler<'_> {
    type Records = Vec<NormalizedEvent>;

    fn tolerates_fetch_failure(&self) -> bool {
        true
    }

    async fn reconcile(
        &self,
        local: Vec<NormalizedEvent>,
        fetched: Vec<NormalizedEvent>,
        now: NaiveDateTime,
    ) -> CalcronResult<Vec<NormalizedEvent>> {
        let events = merge_events(local, fetched);

        match update_relay(self.actuator, self.pin, &events, now).await {
            Ok(state) => info!(pin = self.pin, %state, "Relay position"),
            Err(e) => error!(pin = self.pin, error = %e, "Could not update relay"),
        }

        Ok(prune_events(events, now))
    }

    async fn reset(&self, _events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::engine::testing::{FakeRelay, FakeSource};
    use crate::engine::{EngineConfig, Ledger, SchedulingEngine};
    use crate::event::{EventStatus, EventTime, RemoteEvent};
    use chrono::{Duration, NaiveDate};

    fn at(y: i32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, 12, 7)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn heat(
        id: &str,
        status: EventStatus,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> NormalizedEvent {
        NormalizedEvent {
            id: id.to_string(),
            status,
            start,
            end,
            description: String::new(),
            summary: Some("heat".to_string()),
            updated: None,
        }
    }

    #[test]
    fn test_desired_state() {
        let now = at(2014, 21, 25);
        let running = heat("a", EventStatus::Confirmed, at(2014, 21, 0), at(2014, 22, 0));
        let cancelled = heat("b", EventStatus::Cancelled, at(2014, 21, 0), at(2014, 22, 0));
        let future = heat("c", EventStatus::Confirmed, at(2114, 21, 0), at(2114, 22, 0));
        let past = heat("d", EventStatus::Confirmed, at(2013, 21, 0), at(2013, 22, 0));

        assert_eq!(desired_state(&[running.clone()], now), RelayState::On);
        assert_eq!(desired_state(&[cancelled], now), RelayState::Off);
        assert_eq!(desired_state(&[future, past], now), RelayState::Off);
        // Window bounds are exclusive
        assert_eq!(desired_state(&[running], at(2014, 22, 0)), RelayState::Off);
    }

    #[tokio::test]
    async fn test_update_relay_writes_only_on_change() {
        let relay = FakeRelay::new(RelayState::Off);
        let events = vec![heat("a", EventStatus::Confirmed, at(2014, 21, 0), at(2014, 22, 0))];
        let inside = at(2014, 21, 25);

        assert_eq!(update_relay(&relay, 1, &events, inside).await.unwrap(), RelayState::On);
        assert_eq!(update_relay(&relay, 1, &events, inside).await.unwrap(), RelayState::On);
        assert_eq!(*relay.writes.lock().unwrap(), vec![RelayState::On]);

        let outside = at(2014, 23, 0);
        assert_eq!(update_relay(&relay, 1, &events, outside).await.unwrap(), RelayState::Off);
        assert_eq!(update_relay(&relay, 1, &events, outside).await.unwrap(), RelayState::Off);
        assert_eq!(*relay.writes.lock().unwrap(), vec![RelayState::On, RelayState::Off]);
    }

    fn remote(id: &str, start: NaiveDateTime, end: NaiveDateTime) -> RemoteEvent {
        RemoteEvent {
            id: id.to_string(),
            status: EventStatus::Confirmed,
            start: Some(EventTime::date_time(start.and_utc().to_rfc3339())),
            end: Some(EventTime::date_time(end.and_utc().to_rfc3339())),
            summary: Some("heat".to_string()),
            description: None,
            updated: None,
        }
    }

    #[tokio::test]
    async fn test_pass_merges_switches_and_prunes() {
        let now = at(2026, 21, 25);
        let clock = FixedClock::at(now);
        let source = FakeSource::returning(vec![remote("new", at(2026, 21, 0), at(2026, 22, 0))]);
        let engine = SchedulingEngine::new(
            EngineConfig::new("cal").with_lookback(Duration::hours(1)),
            &source,
            &clock,
        );
        let relay = FakeRelay::new(RelayState::Off);
        let reconciler = RelayReconciler::new(24, &relay);
        let local = vec![heat("old", EventStatus::Confirmed, at(2026, 8, 0), at(2026, 9, 0))];

        let next = engine
            .run(&Ledger { last_sync: None, records: local }, &reconciler)
            .await
            .unwrap();

        assert_eq!(*relay.writes.lock().unwrap(), vec![RelayState::On]);
        assert_eq!(next.records.len(), 1);
        assert_eq!(next.records[0].id, "new");
        assert_eq!(next.last_sync, Some(now.and_utc()));
        assert_eq!(
            source.seen.lock().unwrap()[0][0].time_min,
            (now - Duration::hours(1)).and_utc()
        );
    }

    #[tokio::test]
    async fn test_pass_uses_cached_events_when_offline() {
        let now = at(2026, 21, 25);
        let clock = FixedClock::at(now);
        let source = FakeSource::failing();
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);
        let relay = FakeRelay::new(RelayState::Off);
        let reconciler = RelayReconciler::new(24, &relay);
        let cached = vec![heat("a", EventStatus::Confirmed, at(2026, 21, 0), at(2026, 22, 0))];

        let next = engine
            .run(&Ledger { last_sync: None, records: cached.clone() }, &reconciler)
            .await
            .unwrap();

        assert_eq!(*relay.state.lock().unwrap(), RelayState::On);
        assert_eq!(next.records, cached);
        assert_eq!(next.last_sync, None);
    }

    #[tokio::test]
    async fn test_broken_actuator_does_not_fail_pass() {
        let now = at(2026, 21, 25);
        let clock = FixedClock::at(now);
        let source = FakeSource::returning(vec![]);
        let engine = SchedulingEngine::new(EngineConfig::new("cal"), &source, &clock);
        let mut relay = FakeRelay::new(RelayState::Off);
        relay.broken = true;
        let reconciler = RelayReconciler::new(24, &relay);

        let next = engine
            .run(&Ledger { last_sync: None, records: Vec::new() }, &reconciler)
            .await
            .unwrap();

        assert!(relay.writes.lock().unwrap().is_empty());
        assert_eq!(next.last_sync, Some(now.and_utc()));
    }
}
