//! Persisted settings and sync state.
//!
//! One JSON record per instance, holding the calendar settings, the
//! watermark and what the flavor keeps between syncs:
//!
//! ```json
//! {
//!   "version": 1,
//!   "calendar_id": "abc@group.calendar.google.com",
//!   "provider": "google",
//!   "last_sync": "2026-10-15T08:00:00Z",
//!   "flavor": "commands",
//!   "event_start_cmd": "/usr/bin/heating on",
//!   "event_end_cmd": "/usr/bin/heating off",
//!   "jobs": { "e1": { "ids": ["12", "13"], "end": "2026-10-15T10:00:00" } }
//! }
//! ```

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::STATE_SCHEMA_VERSION;
use crate::deferred::CommandTemplates;
use crate::engine::Ledger;
use crate::error::{CalcronError, CalcronResult};
use crate::event::NormalizedEvent;
use crate::schedule::JobMap;

pub const DEFAULT_PROVIDER: &str = "google";

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub calendar_id: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub flavor: FlavorState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flavor", rename_all = "snake_case")]
pub enum FlavorState {
    /// Schedule commands through an `at`-style executor.
    Commands {
        event_start_cmd: String,
        event_end_cmd: String,
        #[serde(default)]
        description_commands: bool,
        #[serde(default)]
        jobs: JobMap,
    },
    /// Keep one relay on while an event runs.
    Relay {
        relay_pin: u32,
        #[serde(default)]
        events: Vec<NormalizedEvent>,
    },
}

impl PersistedState {
    pub fn new_commands(
        calendar_id: impl Into<String>,
        templates: CommandTemplates,
        description_commands: bool,
    ) -> Self {
        PersistedState {
            version: STATE_SCHEMA_VERSION,
            calendar_id: calendar_id.into(),
            provider: default_provider(),
            last_sync: None,
            flavor: FlavorState::Commands {
                event_start_cmd: templates.start,
                event_end_cmd: templates.end,
                description_commands,
                jobs: JobMap::new(),
            },
        }
    }

    pub fn new_relay(calendar_id: impl Into<String>, relay_pin: u32) -> Self {
        PersistedState {
            version: STATE_SCHEMA_VERSION,
            calendar_id: calendar_id.into(),
            provider: default_provider(),
            last_sync: None,
            flavor: FlavorState::Relay {
                relay_pin,
                events: Vec::new(),
            },
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Parse and validate a stored record.
    pub fn from_json(content: &str) -> CalcronResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| CalcronError::Schema(format!("state is not valid JSON: {e}")))?;

        match value.get("version").and_then(|v| v.as_u64()) {
            None => {
                return Err(CalcronError::Schema(
                    "state has no version field; run with --reset or recreate it".into(),
                ));
            }
            Some(v) if v != u64::from(STATE_SCHEMA_VERSION) => {
                return Err(CalcronError::Schema(format!(
                    "unsupported state version {v} (expected {STATE_SCHEMA_VERSION})"
                )));
            }
            Some(_) => {}
        }

        serde_json::from_value(value).map_err(|e| CalcronError::Schema(e.to_string()))
    }

    pub fn to_json(&self) -> CalcronResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CalcronError::Serialization(e.to_string()))
    }

    pub fn flavor_name(&self) -> &'static str {
        match self.flavor {
            FlavorState::Commands { .. } => "commands",
            FlavorState::Relay { .. } => "relay",
        }
    }

    /// The next state after a command-flavor pass.
    pub fn with_job_ledger(mut self, ledger: Ledger<JobMap>) -> CalcronResult<Self> {
        match &mut self.flavor {
            FlavorState::Commands { jobs, .. } => *jobs = ledger.records,
            FlavorState::Relay { .. } => {
                return Err(CalcronError::Schema("job records on a relay state".into()));
            }
        }
        self.last_sync = ledger.last_sync;
        Ok(self)
    }

    /// The next state after a relay-flavor pass.
    pub fn with_event_ledger(
        mut self,
        ledger: Ledger<Vec<NormalizedEvent>>,
    ) -> CalcronResult<Self> {
        match &mut self.flavor {
            FlavorState::Relay { events, .. } => *events = ledger.records,
            FlavorState::Commands { .. } => {
                return Err(CalcronError::Schema("event snapshots on a commands state".into()));
            }
        }
        self.last_sync = ledger.last_sync;
        Ok(self)
    }
}

/// Where a [`PersistedState`] lives between runs.
pub trait StateStore {
    fn load(&self) -> CalcronResult<Option<PersistedState>>;

    /// Must not leave a half-written record behind if interrupted.
    fn save(&self, state: &PersistedState) -> CalcronResult<()>;
}

/// Produces the settings for a first run.
pub trait ConfigurationProvider {
    fn initial_state(&self) -> CalcronResult<PersistedState>;
}

/// Load the state, asking `provider` for one (and saving it) if none exists.
pub fn load_or_init(
    store: &dyn StateStore,
    provider: &dyn ConfigurationProvider,
) -> CalcronResult<PersistedState> {
    if let Some(state) = store.load()? {
        return Ok(state);
    }

    let state = provider.initial_state()?;
    store.save(&state)?;
    Ok(state)
}

/// A state file on disk, written via a temp file and a rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> CalcronResult<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            CalcronError::Persistence(format!("Could not read {}: {e}", self.path.display()))
        })?;
        PersistedState::from_json(&content).map(Some)
    }

    fn save(&self, state: &PersistedState) -> CalcronResult<()> {
        let content = state.to_json()?;
        let temp = self.temp_path();
        let persistence = |e: std::io::Error| {
            CalcronError::Persistence(format!("Could not write {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persistence)?;
        }

        let mut file = std::fs::File::create(&temp).map_err(persistence)?;
        file.write_all(content.as_bytes()).map_err(persistence)?;
        file.sync_all().map_err(persistence)?;
        drop(file);

        std::fs::rename(&temp, &self.path).map_err(persistence)?;
        debug!(path = %self.path.display(), "Saved state");
        Ok(())
    }
}
