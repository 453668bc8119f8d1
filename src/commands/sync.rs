use std::path::Path;

use anyhow::{Context, Result};
use calcron_core::deferred::CommandTemplates;
use calcron_core::engine::{Ledger, SchedulingEngine};
use calcron_core::relay::RelayReconciler;
use calcron_core::schedule::CommandScheduler;
use calcron_core::state::{FlavorState, JsonFileStore, StateStore, load_or_init};
use tracing::info;

use super::{Collaborators, engine_config};
use crate::actuator::CommandActuator;
use crate::config::AppConfig;
use crate::executor::AtExecutor;
use crate::prompt::DialoguerPrompt;

pub async fn run(app: &AppConfig, settings: &Path) -> Result<()> {
    let store = JsonFileStore::new(settings);
    let state = load_or_init(&store, &DialoguerPrompt)
        .with_context(|| format!("Could not load settings from {}", settings.display()))?;
    info!(calendar = %state.calendar_id, flavor = state.flavor_name(), "Starting sync");

    let deps = Collaborators::for_state(&state);

    let next = match &state.flavor {
        FlavorState::Commands {
            event_start_cmd,
            event_end_cmd,
            description_commands,
            jobs,
        } => {
            let config = engine_config(app, &state, false)?;
            let engine = SchedulingEngine::new(config, &deps.source, &deps.clock);
            let executor = AtExecutor::new(&app.at_binary);
            let templates = CommandTemplates {
                start: event_start_cmd.clone(),
                end: event_end_cmd.clone(),
            };
            let scheduler = CommandScheduler::new(templates, &executor)
                .with_description_commands(*description_commands);
            let ledger = Ledger {
                last_sync: state.last_sync,
                records: jobs.clone(),
            };

            let next = engine.run(&ledger, &scheduler).await?;
            info!(tracked = next.records.len(), "Job bookkeeping updated");
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

            let next = engine.run(&ledger, &reconciler).await?;
            info!(cached = next.records.len(), "Event cache updated");
            state.clone().with_event_ledger(next)?
        }
    };

    store.save(&next)?;
    Ok(())
}
