pub mod reset;
pub mod sync;

use anyhow::Result;
use calcron_core::clock::SystemClock;
use calcron_core::engine::EngineConfig;
use calcron_core::remote::Provider;
use calcron_core::state::PersistedState;
use chrono::Duration;

use crate::config::AppConfig;

/// Engine settings for a stored instance. The relay flavor re-reads
/// `relay_lookback` of the past so events edited while they ran are seen.
fn engine_config(app: &AppConfig, state: &PersistedState, relay: bool) -> Result<EngineConfig> {
    let lookback = if relay { app.relay_lookback()? } else { Duration::zero() };
    Ok(EngineConfig::new(&state.calendar_id)
        .with_horizon(app.horizon()?)
        .with_lookback(lookback))
}

/// What a pass talks to besides the executor or relay.
struct Collaborators {
    source: Provider,
    clock: SystemClock,
}

impl Collaborators {
    fn for_state(state: &PersistedState) -> Self {
        Collaborators {
            source: Provider::from_name(&state.provider),
            clock: SystemClock,
        }
    }
}
