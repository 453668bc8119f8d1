use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A command to hand to the executor at a local wall-clock instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAction {
    pub command: String,
    pub at: NaiveDateTime,
}

impl DerivedAction {
    pub fn new(command: impl Into<String>, at: NaiveDateTime) -> Self {
        DerivedAction {
            command: command.into(),
            at,
        }
    }
}
