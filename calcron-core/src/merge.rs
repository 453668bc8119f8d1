//! Merging fetched events into the locally saved event list.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::info;

use crate::event::NormalizedEvent;

/// Merge `incoming` into `existing` by identifier.
///
/// Matching entries are replaced in place, unknown ones are appended in
/// incoming order. Entries missing from `incoming` are kept: the fetch
/// window may simply not have covered them.
pub fn merge_events(
    existing: Vec<NormalizedEvent>,
    incoming: impl IntoIterator<Item = NormalizedEvent>,
) -> Vec<NormalizedEvent> {
    let mut merged = existing;
    let mut positions: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, event)| (event.id.clone(), i))
        .collect();

    for event in incoming {
        match positions.get(&event.id) {
            Some(&i) => merged[i] = event,
            None => {
                positions.insert(event.id.clone(), merged.len());
                merged.push(event);
            }
        }
    }

    merged
}

/// Drop events that ended before `now`.
pub fn prune_events(events: Vec<NormalizedEvent>, now: NaiveDateTime) -> Vec<NormalizedEvent> {
    events
        .into_iter()
        .filter(|event| {
            let keep = event.end >= now;
            if !keep {
                info!(event = %event.id, "removing event: in the past");
            }
            keep
        })
        .collect()
}
