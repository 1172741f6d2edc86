use serde::{Deserialize, Serialize};

/// World-level settings.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Label used in log output.
    pub name: String,
    /// Log hook failures that have no handler installed for their kind.
    pub log_hook_failures: bool,
    /// Keep a journal of lifecycle transitions, see [`crate::WorldEvent`].
    pub record_events: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".into(),
            log_hook_failures: true,
            record_events: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: WorldConfig = serde_json::from_str(r#"{ "name": "arena" }"#).unwrap();
        assert_eq!(config.name, "arena");
        assert!(config.log_hook_failures);
        assert!(config.record_events);
    }
}
