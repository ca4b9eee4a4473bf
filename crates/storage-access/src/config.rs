//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use storage_access_core::{GrantReason, Principal};
use storage_access_policy::EvaluatorOptions;

use crate::error::{EngineError, Result};

/// Hard ceiling on the lifetime of an automatically issued grant.
pub const MAX_AUTO_GRANT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// Default lifetime of a durable storage-access grant (30 days).
pub const DEFAULT_STORAGE_ACCESS_EXPIRATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Allow grants triggered by a tracker opening a popup.
    pub heuristic_window_open: bool,
    /// Allow grants triggered by a popup opened after user interaction.
    pub heuristic_opened_window_after_interaction: bool,
    /// Hosts or origins whose grants require a recorded prior interaction.
    ///
    /// Entries are a bare host (`tracker.test`), a wildcard host
    /// (`*.tracker.test`) or a full origin (`https://tracker.test`).
    pub user_interaction_required_for_hosts: Vec<String>,
    /// Lifetime of a durable grant, in seconds.
    pub storage_access_expiration_secs: u64,
    /// Stand in for an out-of-process top frame with the nearest in-process
    /// ancestor.
    pub out_of_process_top_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heuristic_window_open: true,
            heuristic_opened_window_after_interaction: true,
            user_interaction_required_for_hosts: Vec::new(),
            storage_access_expiration_secs: DEFAULT_STORAGE_ACCESS_EXPIRATION_SECS,
            out_of_process_top_fallback: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        if config.storage_access_expiration_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "storage_access_expiration_secs must be positive".into(),
            ));
        }
        Ok(config)
    }

    pub fn evaluator_options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            out_of_process_top_fallback: self.out_of_process_top_fallback,
        }
    }

    pub fn storage_access_expiration(&self) -> Duration {
        Duration::from_secs(self.storage_access_expiration_secs)
    }

    /// Whether grants for `reason` are enabled.
    pub fn heuristic_enabled(&self, reason: GrantReason) -> bool {
        match reason {
            GrantReason::Opener => self.heuristic_window_open,
            GrantReason::OpenerAfterUserInteraction => {
                self.heuristic_opened_window_after_interaction
            }
            GrantReason::StorageAccessApi => true,
        }
    }

    /// Whether `principal` matches the interaction-required list.
    pub fn requires_interaction(&self, principal: &Principal) -> bool {
        let origin = principal.origin();
        let host = origin.host();
        let serialized = origin.ascii_serialization();

        self.user_interaction_required_for_hosts
            .iter()
            .map(|entry| entry.trim())
            .any(|entry| {
                if let Some(suffix) = entry.strip_prefix("*.") {
                    host == suffix || host.ends_with(&format!(".{suffix}"))
                } else {
                    entry.eq_ignore_ascii_case(host) || entry == serialized
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(url: &str) -> Principal {
        Principal::from_url(url).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!(config.heuristic_window_open);
        assert_eq!(config.storage_access_expiration_secs, 2_592_000);
        assert!(config.evaluator_options().out_of_process_top_fallback);
        assert!(config.heuristic_enabled(GrantReason::StorageAccessApi));
    }

    #[test]
    fn test_from_json_keeps_missing_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "heuristic_window_open": false, "user_interaction_required_for_hosts": ["tracker.test"] }"#,
        )
        .unwrap();
        assert!(!config.heuristic_enabled(GrantReason::Opener));
        assert!(config.heuristic_enabled(GrantReason::OpenerAfterUserInteraction));
        assert_eq!(
            config.storage_access_expiration(),
            Duration::from_secs(DEFAULT_STORAGE_ACCESS_EXPIRATION_SECS)
        );
    }

    #[test]
    fn test_from_json_rejects_bad_input() {
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "storage_access_expiration_secs": 0 }"#),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_interaction_list_matching() {
        let config = EngineConfig {
            user_interaction_required_for_hosts: vec![
                "tracker.test".into(),
                "*.social.example".into(),
                "https://pixel.example:8443".into(),
            ],
            ..EngineConfig::default()
        };

        assert!(config.requires_interaction(&principal("https://tracker.test/x")));
        assert!(!config.requires_interaction(&principal("https://sub.tracker.test")));
        assert!(config.requires_interaction(&principal("https://a.social.example")));
        assert!(config.requires_interaction(&principal("https://social.example")));
        assert!(config.requires_interaction(&principal("https://pixel.example:8443")));
        assert!(!config.requires_interaction(&principal("https://pixel.example")));
    }
}
