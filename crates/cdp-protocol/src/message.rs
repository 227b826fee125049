//! Request/response/event envelopes (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteErrorCategory;

/// A request id. Monotonic per channel, assigned at submission, never
/// reused within a session (spec §3 invariant).
pub type Id = u64;

/// An outbound command: `{ id, method, params }`.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: Id,
    pub method: String,
    pub params: Value,
}

/// The `error` object inside a failed response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
}

impl RemoteError {
    pub fn category(&self) -> RemoteErrorCategory {
        RemoteErrorCategory::classify(self.code, &self.message)
    }
}

/// The payload of a completed request, either side of the `result`/`error`
/// union in spec §3.
#[derive(Debug, Clone)]
pub enum ResponseOutcome {
    Result(Value),
    Error(RemoteError),
}

/// Either a correlated response or an uncorrelated event, after one JSON
/// parse of an inbound text message (spec §4.E receive path: "Parse JSON
/// once").
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Response { id: Id, outcome: ResponseOutcome },
    Event { method: String, params: Value },
}

impl InboundMessage {
    /// Parse one inbound JSON text message into a response or an event.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    fn from_value(mut value: Value) -> Result<Self, serde_json::Error> {
        let obj = value
            .as_object_mut()
            .ok_or_else(|| serde::de::Error::custom("CDP message is not a JSON object"))?;

        if let Some(id_value) = obj.remove("id") {
            let id: Id = serde_json::from_value(id_value)?;
            let outcome = if let Some(error) = obj.remove("error") {
                ResponseOutcome::Error(serde_json::from_value(error)?)
            } else {
                let result = obj.remove("result").unwrap_or(Value::Object(Default::default()));
                ResponseOutcome::Result(result)
            };
            Ok(InboundMessage::Response { id, outcome })
        } else {
            let method = obj
                .remove("method")
                .ok_or_else(|| serde::de::Error::custom("CDP event missing 'method'"))?;
            let method: String = serde_json::from_value(method)?;
            let params = obj.remove("params").unwrap_or(Value::Object(Default::default()));
            Ok(InboundMessage::Event { method, params })
        }
    }
}
