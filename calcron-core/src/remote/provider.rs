//! Provider subprocess protocol.
//!
//! Calendar access lives in external provider binaries (e.g.
//! `calcron-provider-google`) spoken to with JSON over stdin/stdout.
//! Providers own their credentials and the calendar wire protocol;
//! calcron only hands them fetch queries.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{CalcronError, CalcronResult};
use crate::event::RemoteEvent;
use crate::ports::EventSource;
use crate::query::FetchQuery;
use crate::remote::protocol::{Command, ListEvents, ProviderCommand, Request, Response};

/// Listing a week of events may page through several API calls.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone, Debug)]
pub struct Provider {
    name: String,
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider {
            name: name.to_string(),
            binary: None,
            timeout: PROVIDER_TIMEOUT,
        }
    }

    /// Use this executable instead of looking the provider up in PATH.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn binary_path(&self) -> CalcronResult<PathBuf> {
        if let Some(binary) = &self.binary {
            return Ok(binary.clone());
        }

        let binary_name = format!("calcron-provider-{}", self.name);
        which::which(&binary_name).map_err(|_| CalcronError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return the result.
    ///
    /// The response type is inferred from the command's associated type.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> CalcronResult<C::Response> {
        timeout(self.timeout, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| CalcronError::ProviderTimeout(self.timeout.as_secs()))?
    }

    /// Low-level call that sends a command with params and deserializes the response.
    async fn call_raw<P: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> CalcronResult<R> {
        let params = serde_json::to_value(params)
            .map_err(|e| CalcronError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| CalcronError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;
        debug!(
            provider = %self.name,
            binary = %binary_path.display(),
            ?command,
            "Calling provider"
        );

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CalcronError::Provider(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CalcronError::Provider("Provider stdin unavailable".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(CalcronError::Provider(format!(
                "Provider exited with status: {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(CalcronError::Provider("Provider returned no response".into()));
        }

        let response: Response<R> = serde_json::from_str(&response_str)
            .map_err(|e| CalcronError::Provider(format!("Failed to parse response: {}", e)))?;

        match response {
            Response::Success { data } => Ok(data),
            Response::Error { error } => Err(CalcronError::Provider(error)),
        }
    }
}

#[async_trait]
impl EventSource for Provider {
    async fn fetch(&self, queries: &[FetchQuery]) -> CalcronResult<Vec<RemoteEvent>> {
        let items = self
            .call(ListEvents {
                queries: queries.to_vec(),
            })
            .await
            .map_err(|e| CalcronError::Transport(format!("{}: {e}", self.name)))?;

        let events = items
            .into_iter()
            .filter_map(|item| match RemoteEvent::from_value(item) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(provider = %self.name, error = %e, "Skipping event");
                    None
                }
            })
            .collect();
        Ok(events)
    }
}
