//! Defines the JSON protocol used for communication between calcron
//! and provider binaries over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{CalcronError, CalcronResult};
use crate::query::FetchQuery;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ListEvents,
}

/// Request sent from calcron to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider to calcron.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> CalcronResult<String> {
        serde_json::to_string(&Response::Success { data })
            .map_err(|e| CalcronError::Serialization(e.to_string()))
    }
}

impl Response<()> {
    pub fn error(msg: &str) -> CalcronResult<String> {
        serde_json::to_string(&Response::<()>::Error {
            error: msg.to_string(),
        })
        .map_err(|e| CalcronError::Serialization(e.to_string()))
    }
}

/// List events for every query, following pagination until exhausted.
/// Deleted events must be included with status `cancelled`.
///
/// Items are decoded one by one, see [`crate::event::RemoteEvent::from_value`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    pub queries: Vec<FetchQuery>,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<serde_json::Value>;
    fn command() -> Command {
        Command::ListEvents
    }
}
