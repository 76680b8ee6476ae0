//! Executor configuration knobs.

use crate::engine::DefaultEntryRule;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

/// Settings shared by every executor.
///
/// The scalar knobs can be loaded from JSON; the worker pool is a live
/// runtime handle and is always supplied in code.
///
/// ```
/// use statewise::{DefaultEntryRule, ExecutorConfig};
///
/// let config: ExecutorConfig =
///     serde_json::from_str(r#"{ "default_entry_rule": "none" }"#).unwrap();
/// assert!(config.auto_start);
/// assert_eq!(config.default_entry_rule, DefaultEntryRule::None);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Allow an explicit `go`. When disabled, `go` is refused and the
    /// machine is started by its first event. A first `take` starts the
    /// machine either way.
    pub auto_start: bool,

    /// How regions entered without an explicit target are resolved.
    pub default_entry_rule: DefaultEntryRule,

    /// Runtime for activities, time events and queued steps.
    #[serde(skip)]
    pub worker_pool: Option<Handle>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            default_entry_rule: DefaultEntryRule::Initial,
            worker_pool: None,
        }
    }
}

impl ExecutorConfig {
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    pub fn default_entry_rule(mut self, rule: DefaultEntryRule) -> Self {
        self.default_entry_rule = rule;
        self
    }

    pub fn worker_pool(mut self, handle: Handle) -> Self {
        self.worker_pool = Some(handle);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_start_automatically_through_initials() {
        let config = ExecutorConfig::default();
        assert!(config.auto_start);
        assert_eq!(config.default_entry_rule, DefaultEntryRule::Initial);
        assert!(config.worker_pool.is_none());
    }

    #[test]
    fn setters_chain() {
        let config = ExecutorConfig::default()
            .auto_start(false)
            .default_entry_rule(DefaultEntryRule::None);
        assert!(!config.auto_start);
        assert_eq!(config.default_entry_rule, DefaultEntryRule::None);
    }

    #[test]
    fn scalar_knobs_serialize_without_pool() {
        let json = serde_json::to_value(ExecutorConfig::default().auto_start(false)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "auto_start": false, "default_entry_rule": "initial" })
        );
    }
}
