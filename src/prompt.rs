//! First-run questions, asked when no settings file exists yet.

use std::io::IsTerminal;

use calcron_core::deferred::CommandTemplates;
use calcron_core::state::{ConfigurationProvider, DEFAULT_PROVIDER, PersistedState};
use calcron_core::{CalcronError, CalcronResult};
use dialoguer::{Confirm, Input, Select};
use owo_colors::OwoColorize;

const FLAVORS: [&str; 2] = [
    "Run commands when events start and end",
    "Switch a relay while events run",
];

pub struct DialoguerPrompt;

fn prompt_err(e: dialoguer::Error) -> CalcronError {
    CalcronError::Config(format!("prompt failed: {e}"))
}

fn ask(prompt: &str) -> CalcronResult<String> {
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .map(|answer| answer.trim().to_string())
        .map_err(prompt_err)
}

impl ConfigurationProvider for DialoguerPrompt {
    fn initial_state(&self) -> CalcronResult<PersistedState> {
        if !std::io::stdin().is_terminal() {
            return Err(CalcronError::Config(
                "no settings file found; run calcron once from a terminal to create it".into(),
            ));
        }

        println!("{}", "No settings found, let's create them.".bold());

        let flavor = Select::new()
            .with_prompt("  Mode")
            .items(&FLAVORS[..])
            .default(0)
            .interact()
            .map_err(prompt_err)?;

        let calendar_id = ask("  Calendar id")?;
        let provider: String = Input::new()
            .with_prompt("  Provider")
            .default(DEFAULT_PROVIDER.to_string())
            .interact_text()
            .map_err(prompt_err)?;

        let state = if flavor == 0 {
            let start = ask("  Command to run when an event starts")?;
            let end = ask("  Command to run when an event ends")?;
            let description_commands = Confirm::new()
                .with_prompt("  Take commands from event descriptions instead, when present?")
                .default(false)
                .interact()
                .map_err(prompt_err)?;
            let templates = CommandTemplates { start, end };
            PersistedState::new_commands(calendar_id, templates, description_commands)
        } else {
            let pin: u32 = Input::new()
                .with_prompt("  Relay pin")
                .interact_text()
                .map_err(prompt_err)?;
            PersistedState::new_relay(calendar_id, pin)
        };

        println!("{}", format!("  Using {} mode", state.flavor_name()).green());
        Ok(state.with_provider(provider.trim()))
    }
}
