//! Typed Eiffel events
//!
//! An [`Event`] is a decoded protocol event whose payload has already been
//! matched against its type and edition. An event decoded from a document
//! keeps that document: serialising it, validating it and computing its
//! signature digest all work on the JSON document the repository
//! returned, not on a re-rendering of the typed fields. Events built locally
//! render from their typed fields.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::raw::RawEvent;
use crate::error::{EtosError, Result};

/// Conclusion value that marks an outcome as successful
pub const SUCCESSFUL: &str = "SUCCESSFUL";

/// Link type names used to connect events into a run graph
pub mod link_type {
    /// Activity triggered → run definition
    pub const CAUSE: &str = "CAUSE";
    /// Test suite started → activity or parent suite
    pub const CONTEXT: &str = "CONTEXT";
    /// Activity canceled / finished → activity triggered
    pub const ACTIVITY_EXECUTION: &str = "ACTIVITY_EXECUTION";
    /// Test suite finished → test suite started
    pub const TEST_SUITE_EXECUTION: &str = "TEST_SUITE_EXECUTION";
}

/// The event kinds the engine interprets, each at one supported edition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// EiffelTestExecutionRecipeCollectionCreatedEvent (TERCC)
    Tercc,
    ActivityTriggered,
    ActivityCanceled,
    ActivityFinished,
    TestSuiteStarted,
    TestSuiteFinished,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Tercc,
        EventKind::ActivityTriggered,
        EventKind::ActivityCanceled,
        EventKind::ActivityFinished,
        EventKind::TestSuiteStarted,
        EventKind::TestSuiteFinished,
    ];

    /// Protocol type name as it appears in `meta.type`
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Tercc => "EiffelTestExecutionRecipeCollectionCreatedEvent",
            EventKind::ActivityTriggered => "EiffelActivityTriggeredEvent",
            EventKind::ActivityCanceled => "EiffelActivityCanceledEvent",
            EventKind::ActivityFinished => "EiffelActivityFinishedEvent",
            EventKind::TestSuiteStarted => "EiffelTestSuiteStartedEvent",
            EventKind::TestSuiteFinished => "EiffelTestSuiteFinishedEvent",
        }
    }

    /// The major version this engine decodes
    pub fn supported_major(&self) -> u64 {
        match self {
            EventKind::Tercc | EventKind::ActivityTriggered => 4,
            EventKind::ActivityCanceled
            | EventKind::ActivityFinished
            | EventKind::TestSuiteStarted
            | EventKind::TestSuiteFinished => 3,
        }
    }

    /// Version stamped on events built locally
    pub fn default_version(&self) -> &'static str {
        match self.supported_major() {
            4 => "4.0.0",
            _ => "3.0.0",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EtosError;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EtosError::UnknownEventType {
                event_type: s.to_string(),
            })
    }
}

/// Parse the major component of a semantic version string
pub fn major_version(version: &str) -> Option<u64> {
    version.split('.').next()?.trim().parse().ok()
}

/// Event metadata shared by every kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub version: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Origin of an event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authorship and integrity block (`meta.security`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Security {
    #[serde(default)]
    pub author_identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_protection: Option<IntegrityProtection>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Detached signature over the canonical event form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityProtection {
    pub alg: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Typed edge from one event to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "type")]
    pub link_type: String,
    pub target: String,
}

impl Link {
    pub fn new(link_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            target: target.into(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Payloads
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionStrategy {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Run definition payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerccData {
    pub selection_strategy: SelectionStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batches_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batches: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTriggeredData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCanceledData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub conclusion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFinishedData {
    pub outcome: ActivityOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_logs: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteStartedData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_logs: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a finished test suite
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestSuiteOutcome {
    pub fn is_successful(&self) -> bool {
        self.conclusion.as_deref() == Some(SUCCESSFUL)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteFinishedData {
    #[serde(alias = "testSuiteOutcome")]
    pub outcome: TestSuiteOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_logs: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind-specific payload of an event
///
/// Serialises as the bare payload object; decoding goes through
/// [`EventData::decode`] because the variant is chosen by `meta.type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventData {
    Tercc(TerccData),
    ActivityTriggered(ActivityTriggeredData),
    ActivityCanceled(ActivityCanceledData),
    ActivityFinished(ActivityFinishedData),
    TestSuiteStarted(TestSuiteStartedData),
    TestSuiteFinished(TestSuiteFinishedData),
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::Tercc(_) => EventKind::Tercc,
            EventData::ActivityTriggered(_) => EventKind::ActivityTriggered,
            EventData::ActivityCanceled(_) => EventKind::ActivityCanceled,
            EventData::ActivityFinished(_) => EventKind::ActivityFinished,
            EventData::TestSuiteStarted(_) => EventKind::TestSuiteStarted,
            EventData::TestSuiteFinished(_) => EventKind::TestSuiteFinished,
        }
    }

    /// Decode a raw payload as the given kind
    pub fn decode(kind: EventKind, data: Value) -> Result<Self> {
        let decoded = match kind {
            EventKind::Tercc => serde_json::from_value(data).map(EventData::Tercc),
            EventKind::ActivityTriggered => {
                serde_json::from_value(data).map(EventData::ActivityTriggered)
            }
            EventKind::ActivityCanceled => {
                serde_json::from_value(data).map(EventData::ActivityCanceled)
            }
            EventKind::ActivityFinished => {
                serde_json::from_value(data).map(EventData::ActivityFinished)
            }
            EventKind::TestSuiteStarted => {
                serde_json::from_value(data).map(EventData::TestSuiteStarted)
            }
            EventKind::TestSuiteFinished => {
                serde_json::from_value(data).map(EventData::TestSuiteFinished)
            }
        };
        decoded.map_err(|e| EtosError::InvalidEvent {
            reason: format!("{} data: {}", kind, e),
        })
    }
}

/// A decoded protocol event
///
/// The typed fields are a view of the event. For decoded events, changing
/// them does not change the received document; use [`Event::normalize`] to
/// render from the typed fields instead.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub struct Event {
    pub meta: Meta,
    pub data: EventData,
    pub links: Vec<Link>,
    #[serde(skip)]
    received: Option<Value>,
}

#[derive(Serialize)]
struct TypedEvent<'a> {
    meta: &'a Meta,
    data: &'a EventData,
    links: &'a [Link],
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.received {
            Some(document) => document.serialize(serializer),
            None => TypedEvent {
                meta: &self.meta,
                data: &self.data,
                links: &self.links,
            }
            .serialize(serializer),
        }
    }
}

impl TryFrom<Value> for Event {
    type Error = EtosError;

    fn try_from(value: Value) -> Result<Self> {
        Event::from_value(value)
    }
}

impl Event {
    /// Build a new event with a fresh identifier and the current time
    pub fn new(data: EventData, links: Vec<Link>) -> Self {
        let kind = data.kind();
        Self {
            meta: Meta {
                id: Uuid::new_v4().to_string(),
                event_type: kind.as_str().to_string(),
                version: kind.default_version().to_string(),
                time: Utc::now(),
                tags: None,
                source: None,
                security: None,
                extra: Map::new(),
            },
            data,
            links,
            received: None,
        }
    }

    pub(crate) fn from_parts(meta: Meta, data: EventData, links: Vec<Link>) -> Self {
        Self {
            meta,
            data,
            links,
            received: None,
        }
    }

    pub fn tercc(selection_strategy_id: impl Into<String>) -> Self {
        Self::new(
            EventData::Tercc(TerccData {
                selection_strategy: SelectionStrategy {
                    id: selection_strategy_id.into(),
                    ..Default::default()
                },
                ..Default::default()
            }),
            Vec::new(),
        )
    }

    pub fn activity_triggered(name: impl Into<String>, tercc_id: &str) -> Self {
        Self::new(
            EventData::ActivityTriggered(ActivityTriggeredData {
                name: name.into(),
                ..Default::default()
            }),
            vec![Link::new(link_type::CAUSE, tercc_id)],
        )
    }

    pub fn activity_canceled(activity_id: &str, reason: Option<String>) -> Self {
        Self::new(
            EventData::ActivityCanceled(ActivityCanceledData {
                reason,
                ..Default::default()
            }),
            vec![Link::new(link_type::ACTIVITY_EXECUTION, activity_id)],
        )
    }

    pub fn activity_finished(activity_id: &str, conclusion: impl Into<String>) -> Self {
        Self::new(
            EventData::ActivityFinished(ActivityFinishedData {
                outcome: ActivityOutcome {
                    conclusion: conclusion.into(),
                    description: None,
                },
                ..Default::default()
            }),
            vec![Link::new(link_type::ACTIVITY_EXECUTION, activity_id)],
        )
    }

    /// Test suite started inside `context_id` (an activity or a parent suite)
    pub fn test_suite_started(name: impl Into<String>, context_id: &str) -> Self {
        Self::new(
            EventData::TestSuiteStarted(TestSuiteStartedData {
                name: name.into(),
                ..Default::default()
            }),
            vec![Link::new(link_type::CONTEXT, context_id)],
        )
    }

    pub fn test_suite_finished(suite_id: &str, outcome: TestSuiteOutcome) -> Self {
        Self::new(
            EventData::TestSuiteFinished(TestSuiteFinishedData {
                outcome,
                ..Default::default()
            }),
            vec![Link::new(link_type::TEST_SUITE_EXECUTION, suite_id)],
        )
    }

    /// Replace the generated identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.meta.id = id.into();
        self.received = None;
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.meta.source = Some(source);
        self.received = None;
        self
    }

    /// Decode a JSON document into an event, keeping the document
    pub fn from_value(value: Value) -> Result<Self> {
        let raw = RawEvent::deserialize(&value).map_err(|e| EtosError::InvalidEvent {
            reason: e.to_string(),
        })?;
        let mut event = raw.decode()?;
        event.received = Some(value);
        Ok(event)
    }

    /// The document this event was decoded from, if any
    pub fn received(&self) -> Option<&Value> {
        self.received.as_ref()
    }

    /// Forget the received document and render from the typed fields
    pub fn normalize(&mut self) {
        self.received = None;
    }

    /// Replace `meta.security`, in the received document as well
    ///
    /// Keys of the received security block that `security` does not set are
    /// left as they were.
    pub fn set_security(&mut self, security: Security) -> Result<()> {
        if let Some(document) = self.received.as_mut() {
            let rendered = serde_json::to_value(&security)?;
            let meta = document
                .get_mut("meta")
                .and_then(Value::as_object_mut)
                .ok_or_else(|| EtosError::InvalidEvent {
                    reason: "document has no meta object".to_string(),
                })?;
            let slot = meta
                .entry("security")
                .or_insert_with(|| Value::Object(Map::new()));
            match (slot.as_object_mut(), rendered) {
                (Some(existing), Value::Object(fields)) => existing.extend(fields),
                (_, rendered) => *slot = rendered,
            }
        }
        self.meta.security = Some(security);
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    /// Name carried by activity-triggered and test-suite-started events
    pub fn name(&self) -> Option<&str> {
        match &self.data {
            EventData::ActivityTriggered(data) => Some(&data.name),
            EventData::TestSuiteStarted(data) => Some(&data.name),
            _ => None,
        }
    }

    pub fn suite_outcome(&self) -> Option<&TestSuiteOutcome> {
        match &self.data {
            EventData::TestSuiteFinished(data) => Some(&data.outcome),
            _ => None,
        }
    }

    /// Targets of all links with the given type
    pub fn link_targets<'a>(&'a self, link_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.links
            .iter()
            .filter(move |link| link.link_type == link_type)
            .map(|link| link.target.as_str())
    }

    /// Whether this event links to `target` with the given link type
    pub fn links_to(&self, link_type: &str, target: &str) -> bool {
        self.link_targets(link_type).any(|t| t == target)
    }

    /// Reject events whose kind differs from what a query asked for
    pub fn expect_kind(&self, expected: EventKind) -> Result<()> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(EtosError::UnexpectedEvent {
                expected: expected.to_string(),
                actual: self.kind().to_string(),
                event_id: self.meta.id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn suite_finished_json() -> Value {
        json!({
            "meta": {
                "id": "6a8a4b6e-4b1a-4e2b-9d4a-0c1e2f3a4b5c",
                "type": "EiffelTestSuiteFinishedEvent",
                "version": "3.0.0",
                "time": 1700000000000i64,
                "source": {"host": "runner-1", "serializer": "pkg:maven/x"}
            },
            "data": {
                "outcome": {"verdict": "PASSED", "conclusion": "SUCCESSFUL"},
                "customData": [{"key": "k", "value": "v"}]
            },
            "links": [{"type": "TEST_SUITE_EXECUTION", "target": "suite-1"}]
        })
    }

    #[test]
    fn test_decode_known_kind() {
        let event = Event::from_value(suite_finished_json()).unwrap();
        assert_eq!(event.kind(), EventKind::TestSuiteFinished);
        assert!(event.suite_outcome().unwrap().is_successful());
        assert!(event.links_to(link_type::TEST_SUITE_EXECUTION, "suite-1"));
    }

    #[test]
    fn test_unknown_keys_survive_reserialisation() {
        let original = suite_finished_json();
        let event = Event::from_value(original.clone()).unwrap();
        assert_eq!(event.to_value().unwrap(), original);
    }

    #[test]
    fn test_legacy_outcome_key_is_accepted() {
        let mut value = suite_finished_json();
        let outcome = value["data"]["outcome"].take();
        value["data"] = json!({ "testSuiteOutcome": outcome });
        let event = Event::from_value(value).unwrap();
        assert!(event.suite_outcome().unwrap().is_successful());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut value = suite_finished_json();
        value["meta"]["type"] = json!("EiffelArtifactCreatedEvent");
        let err = Event::from_value(value).unwrap_err();
        assert!(matches!(err, EtosError::UnknownEventType { .. }));
    }

    #[test]
    fn test_unsupported_major_is_rejected() {
        let mut value = suite_finished_json();
        value["meta"]["version"] = json!("4.0.0");
        let err = Event::from_value(value).unwrap_err();
        assert!(matches!(err, EtosError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_builders_link_to_parents() {
        let tercc = Event::tercc("strategy");
        let triggered = Event::activity_triggered("run", tercc.id());
        assert_eq!(triggered.meta.version, "4.0.0");
        assert!(triggered.links_to(link_type::CAUSE, tercc.id()));

        let suite = Event::test_suite_started("suite", triggered.id());
        assert_eq!(suite.name(), Some("suite"));
        assert_eq!(suite.meta.version, "3.0.0");
    }

    #[test]
    fn test_expect_kind() {
        let tercc = Event::tercc("strategy");
        assert!(tercc.expect_kind(EventKind::Tercc).is_ok());
        let err = tercc.expect_kind(EventKind::ActivityTriggered).unwrap_err();
        assert_eq!(err.error_code(), "UNEXPECTED_EVENT");
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("4.1.2"), Some(4));
        assert_eq!(major_version("3"), Some(3));
        assert_eq!(major_version("x.1"), None);
    }
}
