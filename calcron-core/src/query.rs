//! Fetch windows for one sync.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One calendar query: events overlapping `[time_min, time_max]`, optionally
/// only those modified since `updated_min`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchQuery {
    pub calendar_id: String,
    pub time_min: DateTime<Utc>,
    pub time_max: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_min: Option<DateTime<Utc>>,
}

impl FetchQuery {
    fn new(
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        updated_min: Option<DateTime<Utc>>,
    ) -> Self {
        info!(
            from = %time_min.to_rfc3339(),
            to = %time_max.to_rfc3339(),
            updated_min = ?updated_min.map(|t| t.to_rfc3339()),
            "Setting up query"
        );
        FetchQuery {
            calendar_id: calendar_id.to_string(),
            time_min,
            time_max,
            updated_min,
        }
    }
}

/// Build the queries for a sync starting at `sync_start`.
///
/// With a watermark, two queries cover the horizon:
/// - events up to `last_sync + horizon` modified since `last_sync`
///   (edits to events the previous sync already saw),
/// - every event in `[last_sync + horizon, sync_start + horizon]`
///   (events beyond the previous horizon).
///
/// Without one, or with one so old that its horizon has already passed,
/// a single query covers `[sync_start, sync_start + horizon]`. `lookback`
/// moves the lower bound of the first query earlier.
pub fn plan_queries(
    calendar_id: &str,
    sync_start: DateTime<Utc>,
    last_sync: Option<DateTime<Utc>>,
    horizon: Duration,
    lookback: Duration,
) -> Vec<FetchQuery> {
    let end = sync_start + horizon;
    let from = sync_start - lookback;

    let last_sync = last_sync.filter(|last| {
        let fresh = *last + horizon > sync_start;
        if !fresh {
            warn!(
                last_sync = %last.to_rfc3339(),
                "Last sync is older than the horizon, fetching everything"
            );
        }
        fresh
    });

    match last_sync {
        Some(last) => vec![
            FetchQuery::new(calendar_id, from, last + horizon, Some(last)),
            FetchQuery::new(calendar_id, last + horizon, end, None),
        ],
        None => vec![FetchQuery::new(calendar_id, from, end, None)],
    }
}
