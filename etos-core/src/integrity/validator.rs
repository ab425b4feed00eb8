//! Schema validation of events
//!
//! Each supported (event type, edition) pair has a bundled JSON Schema.
//! Validation runs against the serialised event so that unknown fields the
//! typed model carries in `extra` are checked as well.

use std::collections::HashMap;
use std::sync::OnceLock;

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::error::{EtosError, Result};
use crate::events::{major_version, Event, EventKind, Events};

/// Compiled schemas keyed by event kind and major version
pub struct SchemaRegistry {
    schemas: HashMap<(EventKind, u64), JSONSchema>,
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.schemas.keys().collect();
        keys.sort();
        f.debug_struct("SchemaRegistry").field("schemas", &keys).finish()
    }
}

fn bundled_schema(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Tercc => include_str!("../../schemas/EiffelTestExecutionRecipeCollectionCreatedEvent-4.json"),
        EventKind::ActivityTriggered => include_str!("../../schemas/EiffelActivityTriggeredEvent-4.json"),
        EventKind::ActivityCanceled => include_str!("../../schemas/EiffelActivityCanceledEvent-3.json"),
        EventKind::ActivityFinished => include_str!("../../schemas/EiffelActivityFinishedEvent-3.json"),
        EventKind::TestSuiteStarted => include_str!("../../schemas/EiffelTestSuiteStartedEvent-3.json"),
        EventKind::TestSuiteFinished => include_str!("../../schemas/EiffelTestSuiteFinishedEvent-3.json"),
    }
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Registry with the bundled schema for every supported kind
    pub fn default_set() -> Result<Self> {
        let mut registry = Self::empty();
        for kind in EventKind::ALL {
            let schema: Value = serde_json::from_str(bundled_schema(kind)).map_err(|e| {
                EtosError::InvalidSchema {
                    event_type: kind.to_string(),
                    reason: e.to_string(),
                }
            })?;
            registry.register(kind, kind.supported_major(), &schema)?;
        }
        Ok(registry)
    }

    /// Compile and register a schema for one edition of an event kind
    pub fn register(&mut self, kind: EventKind, major: u64, schema: &Value) -> Result<()> {
        let compiled = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(schema)
            .map_err(|e| EtosError::InvalidSchema {
                event_type: kind.to_string(),
                reason: e.to_string(),
            })?;
        self.schemas.insert((kind, major), compiled);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate one event against the schema for its type and edition
    pub fn validate_event(&self, event: &Event) -> Result<()> {
        let major = major_version(&event.meta.version).unwrap_or_default();
        let schema = self
            .schemas
            .get(&(event.kind(), major))
            .ok_or_else(|| EtosError::SchemaUnavailable {
                event_type: event.meta.event_type.clone(),
                version: event.meta.version.clone(),
            })?;

        let instance = event.to_value()?;
        if let Err(errors) = schema.validate(&instance) {
            let reasons: Vec<String> = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{} at {}", e, path)
                    }
                })
                .collect();
            return Err(EtosError::SchemaValidation {
                event_id: event.id().to_string(),
                reason: reasons.join("; "),
            });
        }
        Ok(())
    }

    /// Validate every event present in the aggregate, stopping at the first failure
    pub fn validate_events(&self, events: &Events) -> Result<()> {
        for (location, event) in events.located() {
            self.validate_event(event)
                .map_err(|e| EtosError::EventValidation {
                    location: location.to_string(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }
}

fn shared_registry() -> Result<&'static SchemaRegistry> {
    static REGISTRY: OnceLock<std::result::Result<SchemaRegistry, String>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| SchemaRegistry::default_set().map_err(|e| e.to_string()))
        .as_ref()
        .map_err(|reason| EtosError::InvalidSchema {
            event_type: "bundled schemas".to_string(),
            reason: reason.clone(),
        })
}

/// Validate one event against the bundled schemas
pub fn validate_event(event: &Event) -> Result<()> {
    shared_registry()?.validate_event(event)
}

/// Validate a collected aggregate against the bundled schemas
pub fn validate_events(events: &Events) -> Result<()> {
    shared_registry()?.validate_events(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TestSuiteOutcome;
    use serde_json::json;

    #[test]
    fn test_default_set_covers_every_kind() {
        let registry = SchemaRegistry::default_set().unwrap();
        assert_eq!(registry.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_built_events_validate() {
        let tercc = Event::tercc("strategy");
        let triggered = Event::activity_triggered("run", tercc.id());
        let suite = Event::test_suite_started("suite", triggered.id());
        let finished = Event::test_suite_finished(
            suite.id(),
            TestSuiteOutcome {
                verdict: Some("PASSED".to_string()),
                conclusion: Some("SUCCESSFUL".to_string()),
                description: None,
            },
        );
        for event in [tercc, triggered, suite, finished] {
            validate_event(&event).unwrap();
        }
    }

    #[test]
    fn test_invalid_enum_value_fails() {
        let mut event = Event::test_suite_finished(
            "suite",
            TestSuiteOutcome {
                conclusion: Some("MAYBE".to_string()),
                ..Default::default()
            },
        );
        event.meta.id = "00000000-0000-4000-8000-000000000000".to_string();
        let err = validate_event(&event).unwrap_err();
        assert!(matches!(err, EtosError::SchemaValidation { .. }));
    }

    #[test]
    fn test_received_null_field_fails_validation() {
        let document = json!({
            "meta": {
                "id": "6a8a4b6e-4b1a-4e2b-9d4a-0c1e2f3a4b5c",
                "type": "EiffelTestSuiteFinishedEvent",
                "version": "3.0.0",
                "time": 1700000000000i64
            },
            "data": {"outcome": {"conclusion": "SUCCESSFUL", "description": null}},
            "links": [{"type": "TEST_SUITE_EXECUTION", "target": "6a8a4b6e-4b1a-4e2b-9d4a-0c1e2f3a4b5d"}]
        });
        let event = Event::from_value(document.clone()).unwrap();
        assert_eq!(event.to_value().unwrap(), document);

        let err = validate_event(&event).unwrap_err();
        match err {
            EtosError::SchemaValidation { reason, .. } => {
                assert!(reason.contains("/data/outcome/description"), "{}", reason)
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let mut normalized = event.clone();
        normalized.normalize();
        validate_event(&normalized).unwrap();
    }

    #[test]
    fn test_missing_schema_is_reported() {
        let registry = SchemaRegistry::empty();
        let err = registry.validate_event(&Event::tercc("s")).unwrap_err();
        assert!(matches!(err, EtosError::SchemaUnavailable { .. }));
    }

    #[test]
    fn test_custom_schema_registration() {
        let mut registry = SchemaRegistry::empty();
        registry
            .register(EventKind::Tercc, 4, &json!({"type": "object", "required": ["nope"]}))
            .unwrap();
        assert!(registry.validate_event(&Event::tercc("s")).is_err());
    }

    #[test]
    fn test_aggregate_failure_names_location() {
        let mut events = Events::new();
        let mut tercc = Event::tercc("s");
        tercc.meta.id = "not-a-uuid".to_string();
        events.tercc = Some(tercc);
        let err = validate_events(&events).unwrap_err();
        assert!(err.to_string().starts_with("TERCC event validation failed"));
    }
}
