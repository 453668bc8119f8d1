//! Deciding which commands an event needs right now.
//!
//! An event is looked at on every sync while it is within the fetch window,
//! so the same event is seen before it starts, while it runs and after it was
//! edited or cancelled. The window position together with "do we already
//! track jobs for it" decides what gets (re)scheduled:
//!
//! | window      | tracked | cancelled | actions                          |
//! |-------------|---------|-----------|----------------------------------|
//! | future      | any     | no        | start at start, end at end       |
//! | in progress | no      | no        | start at now + 1m, end at end    |
//! | in progress | no      | yes       | none                             |
//! | in progress | yes     | no        | end at end (replaces old jobs)   |
//! | in progress | yes     | yes       | end at now + 1m                  |
//! | past        | any     | any       | none                             |
//!
//! A cancelled event that is not in progress is removed outright.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::DerivedAction;
use crate::constants::NOW_LEAD_MINUTES;
use crate::event::NormalizedEvent;
use crate::offset::parse_commands;

/// Commands run when an event starts and ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplates {
    pub start: String,
    pub end: String,
}

/// Where an event's window lies relative to now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Future,
    InProgress,
    /// Ended, or a window that fits nowhere else (end before start).
    Past,
}

impl Window {
    pub fn classify(start: NaiveDateTime, end: NaiveDateTime, now: NaiveDateTime) -> Window {
        if start >= now && end >= now {
            Window::Future
        } else if start < now && end >= now {
            Window::InProgress
        } else {
            Window::Past
        }
    }
}

/// The earliest instant an "immediate" action may be scheduled at.
pub fn soonest(now: NaiveDateTime) -> NaiveDateTime {
    now + Duration::minutes(NOW_LEAD_MINUTES)
}

/// Start and end commands due for an event window.
pub fn start_and_end_commands(
    templates: &CommandTemplates,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
    tracked: bool,
    cancelled: bool,
) -> Vec<DerivedAction> {
    match Window::classify(start, end, now) {
        Window::Future => vec![
            DerivedAction::new(&templates.start, start),
            DerivedAction::new(&templates.end, end),
        ],
        Window::InProgress if !tracked => {
            // A deferred start at or after the end would leave it switched on
            if cancelled || end <= soonest(now) {
                Vec::new()
            } else {
                vec![
                    DerivedAction::new(&templates.start, soonest(now)),
                    DerivedAction::new(&templates.end, end),
                ]
            }
        }
        Window::InProgress => {
            debug!("deferred command already scheduled");
            if cancelled {
                vec![DerivedAction::new(&templates.end, soonest(now))]
            } else {
                vec![DerivedAction::new(&templates.end, end)]
            }
        }
        Window::Past => {
            debug!("Ignoring command that was scheduled for the past");
            Vec::new()
        }
    }
}

/// What the scheduler should do with one fetched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPlan {
    /// Cancel any tracked jobs and forget the event.
    Remove,
    /// Cancel any tracked jobs, then schedule these actions.
    Replace(Vec<DerivedAction>),
    /// Leave tracked jobs as they are.
    Keep,
}

/// Plan one event.
///
/// With `description_commands` set, a non-cancelled event with a non-blank
/// description gets its actions from the description instead of the
/// start/end templates.
pub fn plan_event(
    event: &NormalizedEvent,
    now: NaiveDateTime,
    tracked: bool,
    templates: &CommandTemplates,
    description_commands: bool,
) -> EventPlan {
    let cancelled = event.is_cancelled();

    if cancelled && !event.is_in_progress(now) {
        return EventPlan::Remove;
    }

    let actions = if description_commands && !cancelled && !event.description.trim().is_empty() {
        parse_commands(&event.description, event.start, event.end, now)
    } else {
        start_and_end_commands(templates, event.start, event.end, now, tracked, cancelled)
    };

    if actions.is_empty() {
        EventPlan::Keep
    } else {
        EventPlan::Replace(actions)
    }
}
