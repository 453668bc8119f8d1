//! Calendar event types.
//!
//! `RemoteEvent` is what an event source hands over, shaped like the
//! calendar API items (`start.dateTime`, `end.date`, ...). `NormalizedEvent`
//! is the canonical form the engine works with: one identifier, one status
//! and a naive local-time window.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{CalcronError, CalcronResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

/// Start or end of a remote event.
///
/// Timed events carry `dateTime` (RFC3339), all-day events carry `date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl EventTime {
    pub fn date_time(value: impl Into<String>) -> Self {
        EventTime {
            date_time: Some(value.into()),
            date: None,
        }
    }

    pub fn date(value: impl Into<String>) -> Self {
        EventTime {
            date_time: None,
            date: Some(value.into()),
        }
    }

    /// Resolve to the local wall clock.
    fn to_wall_clock(&self, clock: &dyn Clock) -> Result<NaiveDateTime, String> {
        if let Some(raw) = &self.date_time {
            if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
                return Ok(clock.wall_clock(instant.with_timezone(&Utc)));
            }
            // No offset given: already local wall clock
            return NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .map_err(|e| format!("invalid dateTime '{raw}': {e}"));
        }

        if let Some(raw) = &self.date {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|e| format!("invalid date '{raw}': {e}"))?;
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }

        Err("neither dateTime nor date is set".to_string())
    }
}

/// A calendar event as returned by an event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    pub status: EventStatus,
    #[serde(default)]
    pub start: Option<EventTime>,
    #[serde(default)]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Last modification timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

/// An event in the process's local clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub id: String,
    pub status: EventStatus,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl NormalizedEvent {
    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// Strictly inside the window, as used for relay control.
    pub fn covers(&self, now: NaiveDateTime) -> bool {
        self.start < now && now < self.end
    }

    /// Started before `now` and not yet ended.
    pub fn is_in_progress(&self, now: NaiveDateTime) -> bool {
        self.start < now && now <= self.end
    }

    /// Human-readable label for log lines.
    pub fn label(&self) -> &str {
        self.summary.as_deref().unwrap_or(&self.id)
    }
}

impl RemoteEvent {
    /// Decode one item of a provider listing.
    pub fn from_value(value: serde_json::Value) -> CalcronResult<RemoteEvent> {
        let id = value
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or("<no id>")
            .to_string();

        serde_json::from_value(value).map_err(|e| CalcronError::MalformedEvent {
            id,
            reason: e.to_string(),
        })
    }

    /// Convert to a `NormalizedEvent` on the given clock.
    pub fn normalize(&self, clock: &dyn Clock) -> CalcronResult<NormalizedEvent> {
        let malformed = |reason: String| CalcronError::MalformedEvent {
            id: self.id.clone(),
            reason,
        };

        let start = self
            .start
            .as_ref()
            .ok_or_else(|| malformed("missing start".into()))?
            .to_wall_clock(clock)
            .map_err(|e| malformed(format!("start: {e}")))?;
        let end = self
            .end
            .as_ref()
            .ok_or_else(|| malformed("missing end".into()))?
            .to_wall_clock(clock)
            .map_err(|e| malformed(format!("end: {e}")))?;

        Ok(NormalizedEvent {
            id: self.id.clone(),
            status: self.status,
            start,
            end,
            description: self.description.clone().unwrap_or_default(),
            summary: self.summary.clone(),
            updated: self.updated,
        })
    }
}
