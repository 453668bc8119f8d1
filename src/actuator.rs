//! Relay actuator that shells out to a relay control program.

use std::process::Stdio;

use async_trait::async_trait;
use calcron_core::ports::{Actuator, RelayState};
use calcron_core::{CalcronError, CalcronResult};
use tokio::process::Command;
use tracing::debug;

pub struct CommandActuator {
    command: String,
}

impl CommandActuator {
    /// `command` may carry leading arguments, e.g. `"sudo gpio-relay"`.
    pub fn new(command: impl Into<String>) -> Self {
        CommandActuator {
            command: command.into(),
        }
    }

    async fn run(&self, pin: u32, position: Option<RelayState>) -> CalcronResult<RelayState> {
        let mut words = self.command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| CalcronError::Config("relay_command is empty".into()))?;

        let mut args: Vec<String> = words.map(str::to_string).collect();
        args.extend(["--relay".to_string(), pin.to_string()]);
        if let Some(state) = position {
            args.extend(["--position".to_string(), state.as_digit().to_string()]);
        }
        debug!(program, ?args, "Running relay command");

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| CalcronError::Executor(format!("Failed to run {program}: {e}")))?;

        if !output.status.success() {
            return Err(CalcronError::Executor(format!(
                "{program} exited with status {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        parse_state(&String::from_utf8_lossy(&output.stdout))
    }
}

/// The last non-empty line of the relay program's output is `0` or `1`.
pub fn parse_state(stdout: &str) -> CalcronResult<RelayState> {
    let last = stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default();

    RelayState::from_digit(last)
        .ok_or_else(|| CalcronError::Executor(format!("Unexpected relay state '{last}'")))
}

#[async_trait]
impl Actuator for CommandActuator {
    async fn read(&self, pin: u32) -> CalcronResult<RelayState> {
        self.run(pin, None).await
    }

    async fn write(&self, pin: u32, state: RelayState) -> CalcronResult<RelayState> {
        self.run(pin, Some(state)).await
    }
}
