//! Collaborators the engine talks to.
//!
//! The engine never speaks a calendar wire protocol, never spawns a job
//! queue and never touches hardware itself; the host wires these traits to
//! whatever does.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CalcronResult;
use crate::event::RemoteEvent;
use crate::query::FetchQuery;

/// Identifier returned by a command executor for a scheduled job.
pub type JobId = String;

/// Source of calendar events. Pagination is the source's business.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch(&self, queries: &[FetchQuery]) -> CalcronResult<Vec<RemoteEvent>>;
}

/// Schedules commands at wall-clock instants (`at`-style).
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn schedule(&self, command: &str, at: NaiveDateTime) -> CalcronResult<JobId>;

    async fn cancel(&self, job_ids: &[JobId]) -> CalcronResult<()>;
}

/// Position of a binary actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayState {
    Off,
    On,
}

impl RelayState {
    pub fn as_digit(self) -> u8 {
        match self {
            RelayState::Off => 0,
            RelayState::On => 1,
        }
    }

    pub fn from_digit(digit: &str) -> Option<RelayState> {
        match digit.trim() {
            "0" => Some(RelayState::Off),
            "1" => Some(RelayState::On),
            _ => None,
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on { RelayState::On } else { RelayState::Off }
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayState::Off => write!(f, "off"),
            RelayState::On => write!(f, "on"),
        }
    }
}

/// A binary actuator addressed by pin.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn read(&self, pin: u32) -> CalcronResult<RelayState>;

    /// Set the pin and return the state read back afterwards.
    async fn write(&self, pin: u32, state: RelayState) -> CalcronResult<RelayState>;
}
