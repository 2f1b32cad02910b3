//! Backend engine events and per-session acceptance filters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A domain event emitted by the backend engine.
///
/// The gateway treats events as opaque: it only ever looks at `kind` (to
/// run filters) and otherwise forwards the payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event category, e.g. `"vehicle.updated"` or `"order.withdrawn"`.
    pub kind: String,
    /// Engine-defined body.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Decides which events a session buffers.
///
/// Sessions start with [`EventFilter::RefuseAll`] so a client that never
/// asks for events never accumulates any.
///
/// ```text
/// {"type":"AcceptAll"}
/// {"type":"RefuseAll"}
/// {"type":"Kinds","kinds":["vehicle.updated"]}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventFilter {
    AcceptAll,
    #[default]
    RefuseAll,
    /// Accepts events whose `kind` is one of the listed kinds.
    Kinds { kinds: BTreeSet<String> },
}

impl EventFilter {
    /// Builds a [`EventFilter::Kinds`] filter.
    pub fn kinds<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Kinds {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, event: &Event) -> bool {
        match self {
            Self::AcceptAll => true,
            Self::RefuseAll => false,
            Self::Kinds { kinds } => kinds.contains(&event.kind),
        }
    }
}
