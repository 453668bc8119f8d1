use std::path::Path;

use anyhow::Result;
use calcron_core::deferred::CommandTemplates;
use calcron_core::engine::{Ledger, SchedulingEngine};
use calcron_core::relay::RelayReconciler;
use calcron_core::schedule::CommandScheduler;
use calcron_core::state::{FlavorState, JsonFileStore, StateStore};
use tracing::info;

use super::{Collaborators, engine_config};
use crate::actuator::CommandActuator;
use crate::config::AppConfig;
use crate::executor::AtExecutor;

/// Cancel everything tracked and clear the watermark. Settings are kept.
pub async fn run(app: &AppConfig, settings: &Path) -> Result<()> {
    let store = JsonFileStore::new(settings);
    let Some(state) = store.load()? else {
        info!(path = %settings.display(), "No settings found, nothing to reset");
        return Ok(());
    };

    let deps = Collaborators::for_state(&state);

    let next = match &state.flavor {
        FlavorState::Commands {
            event_start_cmd,
            event_end_cmd,
            jobs,
            ..
        } => {
            let config = engine_config(app, &state, false)?;
            let engine = SchedulingEngine::new(config, &deps.source, &deps.clock);
            let executor = AtExecutor::new(&app.at_binary);
            let templates = CommandTemplates {
                start: event_start_cmd.clone(),
                end: event_end_cmd.clone(),
            };
            let scheduler = CommandScheduler::new(templates, &executor);
            let ledger = Ledger {
                last_sync: state.last_sync,
                records: jobs.clone(),
            };

            info!(tracked = jobs.len(), "Cancelling scheduled jobs");
            let next = engine.reset(&ledger, &scheduler).await;
            state.clone().with_job_ledger(next)?
        }
        FlavorState::Relay { relay_pin, events } => {
            let config = engine_config(app, &state, true)?;
            let engine = SchedulingEngine::new(config, &deps.source, &deps.clock);
            let actuator = CommandActuator::new(&app.relay_command);
            let reconciler = RelayReconciler::new(*relay_pin, &actuator);
            let ledger = Ledger {
                last_sync: state.last_sync,
                records: events.clone(),
            };

            state.clone().with_event_ledger(engine.reset(&ledger, &reconciler).await)?
        }
    };

    store.save(&next)?;
    info!("Reset complete");
    Ok(())
}
