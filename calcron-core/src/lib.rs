//! Core of calcron: keeps `at` jobs or a relay in step with a calendar.
//!
//! This crate holds everything that does not need a terminal:
//! - event normalization, time-offset command parsing and merging
//! - the per-event command derivation and the relay decision
//! - the `SchedulingEngine` that runs one sync pass
//! - the versioned state record and its file store
//! - the provider protocol used to fetch calendar events

pub mod action;
pub mod clock;
pub mod constants;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod event;
pub mod merge;
pub mod offset;
pub mod ports;
pub mod query;
pub mod relay;
pub mod remote;
pub mod schedule;
pub mod state;

pub use error::{CalcronError, CalcronResult};
