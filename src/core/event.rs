//! Events submitted to a running machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name carried by the synthetic event handed to behaviors while a
/// completion transition runs.
pub const COMPLETION_EVENT: &str = "$completion";

/// Name carried by the synthetic event handed to behaviors while the
/// machine performs its initial entry.
pub const START_EVENT: &str = "$start";

/// Name carried by the synthetic event handed to behaviors when a time
/// event fires.
pub const TIMEOUT_EVENT: &str = "$after";

/// An occurrence that may trigger transitions.
///
/// Triggers match on [`Event::name`]; the optional JSON payload is opaque to
/// the engine and only visible to guards and behaviors.
///
/// # Example
///
/// ```rust
/// use statewise::Event;
///
/// let event = Event::new("pay").with_payload(serde_json::json!({ "amount": 42 }));
/// assert_eq!(event.name(), "pay");
/// assert_eq!(event.payload().unwrap()["amount"], 42);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<serde_json::Value>,
}

impl Event {
    /// Create an event without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }

    /// True for the synthetic events the engine generates itself.
    pub fn is_synthetic(&self) -> bool {
        self.name.starts_with('$')
    }

    pub(crate) fn completion() -> Self {
        Self::new(COMPLETION_EVENT)
    }

    pub(crate) fn start() -> Self {
        Self::new(START_EVENT)
    }

    pub(crate) fn timeout() -> Self {
        Self::new(TIMEOUT_EVENT)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_from_str_has_no_payload() {
        let event: Event = "go".into();
        assert_eq!(event.name(), "go");
        assert!(event.payload().is_none());
        assert!(!event.is_synthetic());
    }

    #[test]
    fn synthetic_events_are_flagged() {
        assert!(Event::completion().is_synthetic());
        assert!(Event::start().is_synthetic());
        assert!(Event::timeout().is_synthetic());
    }

    #[test]
    fn event_serializes_without_empty_payload() {
        let json = serde_json::to_string(&Event::new("tick")).unwrap();
        assert_eq!(json, r#"{"name":"tick"}"#);
    }
}
