//! Parameters for starting a test run

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};

/// Default test run timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Provider overrides for the environment provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    pub iut_provider: Option<String>,
    pub execution_space_provider: Option<String>,
    pub log_area_provider: Option<String>,
}

/// Parameters for starting a test run
#[derive(Debug, Clone, PartialEq)]
pub struct TestRunParams {
    /// Test suite (recipe collection) to run
    pub test_suite_id: String,
    /// Artifact identity, a purl or an artifact created event id
    pub identity: String,
    /// Activity the run definition links to
    pub parent_activity_id: Option<String>,
    pub workspace: Option<String>,
    pub artifact_dir: Option<String>,
    pub report_dir: Option<String>,
    pub environment: Map<String, Value>,
    pub timeout: Duration,
    pub provider_config: ProviderConfig,
    /// Additional dataset entries for the environment provider
    pub dataset: Vec<Map<String, Value>>,
}

impl Default for TestRunParams {
    fn default() -> Self {
        Self {
            test_suite_id: String::new(),
            identity: String::new(),
            parent_activity_id: None,
            workspace: None,
            artifact_dir: None,
            report_dir: None,
            environment: Map::new(),
            timeout: DEFAULT_TIMEOUT,
            provider_config: ProviderConfig::default(),
            dataset: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct ActivityRef {
    meta: ActivityMeta,
}

#[derive(Deserialize)]
struct ActivityMeta {
    id: String,
}

impl TestRunParams {
    pub fn new(test_suite_id: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            test_suite_id: test_suite_id.into(),
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Fill empty fields from `IDENTITY`, `TEST_SUITE` and `EIFFEL_ACTIVITY_TRIGGERED`
    pub fn apply_env_fallbacks<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.identity.is_empty() {
            if let Some(identity) = env("IDENTITY") {
                self.identity = identity;
            }
        }
        if self.test_suite_id.is_empty() {
            if let Some(suite) = env("TEST_SUITE") {
                self.test_suite_id = suite;
            }
        }
        if self.parent_activity_id.is_none() {
            if let Some(activity) = env("EIFFEL_ACTIVITY_TRIGGERED").filter(|v| !v.is_empty()) {
                match serde_json::from_str::<ActivityRef>(&activity) {
                    Ok(activity) => self.parent_activity_id = Some(activity.meta.id),
                    Err(e) => tracing::warn!("Ignoring EIFFEL_ACTIVITY_TRIGGERED: {}", e),
                }
            }
        }
    }

    /// Request body for `POST /testruns` on the v0 API
    pub fn to_v0_body(&self) -> Value {
        let mut body = json!({
            "test_suite_id": self.test_suite_id,
            "identity": self.identity,
            "environment": self.environment,
            "timeout": self.timeout.as_secs(),
        });

        let optional = [
            ("parent_activity_id", &self.parent_activity_id),
            ("workspace", &self.workspace),
            ("artifact_dir", &self.artifact_dir),
            ("report_dir", &self.report_dir),
            ("iut_provider", &self.provider_config.iut_provider),
            (
                "execution_space_provider",
                &self.provider_config.execution_space_provider,
            ),
            ("log_area_provider", &self.provider_config.log_area_provider),
        ];
        if let Some(object) = body.as_object_mut() {
            for (key, value) in optional {
                if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                    object.insert(key.to_string(), Value::String(value.clone()));
                }
            }
            if !self.dataset.is_empty() {
                object.insert("dataset".to_string(), json!(self.dataset));
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v0_body_omits_unset_fields() {
        let params = TestRunParams::new("suite-url", "pkg:docker/app@1.0");
        let body = params.to_v0_body();
        assert_eq!(
            body,
            json!({
                "test_suite_id": "suite-url",
                "identity": "pkg:docker/app@1.0",
                "environment": {},
                "timeout": 3600,
            })
        );
    }

    #[test]
    fn test_v0_body_includes_providers_and_dataset() {
        let mut params = TestRunParams::new("suite", "id");
        params.timeout = Duration::from_secs(90);
        params.workspace = Some("/work".to_string());
        params.provider_config.iut_provider = Some("default".to_string());
        params.provider_config.log_area_provider = Some(String::new());
        let mut entry = Map::new();
        entry.insert("key".to_string(), json!("value"));
        params.dataset.push(entry);

        let body = params.to_v0_body();
        assert_eq!(body["timeout"], 90);
        assert_eq!(body["workspace"], "/work");
        assert_eq!(body["iut_provider"], "default");
        assert!(body.get("log_area_provider").is_none());
        assert_eq!(body["dataset"], json!([{"key": "value"}]));
    }

    #[test]
    fn test_env_fallbacks_fill_only_empty_fields() {
        let mut params = TestRunParams::new("", "explicit");
        params.apply_env_fallbacks(|key| match key {
            "IDENTITY" => Some("from-env".to_string()),
            "TEST_SUITE" => Some("suite-from-env".to_string()),
            "EIFFEL_ACTIVITY_TRIGGERED" => Some(r#"{"meta": {"id": "act-1"}}"#.to_string()),
            _ => None,
        });
        assert_eq!(params.identity, "explicit");
        assert_eq!(params.test_suite_id, "suite-from-env");
        assert_eq!(params.parent_activity_id.as_deref(), Some("act-1"));
    }

    #[test]
    fn test_malformed_parent_activity_is_ignored() {
        let mut params = TestRunParams::new("suite", "id");
        params.apply_env_fallbacks(|key| {
            (key == "EIFFEL_ACTIVITY_TRIGGERED").then(|| "not json".to_string())
        });
        assert_eq!(params.parent_activity_id, None);
    }
}
