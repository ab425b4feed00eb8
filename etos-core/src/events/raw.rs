//! Undecoded event documents
//!
//! [`RawEvent`] is the shape every repository document shares before its
//! payload is interpreted. Repositories decode through [`RawEvent::decode`]
//! so that nothing past the repository boundary handles untyped payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::{major_version, Event, EventData, EventKind, Link, Meta};
use crate::error::{EtosError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub meta: Meta,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(default)]
    pub links: Vec<Link>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl RawEvent {
    /// Interpret the payload according to `meta.type` and `meta.version`
    pub fn decode(self) -> Result<Event> {
        let kind: EventKind = self.meta.event_type.parse()?;

        match major_version(&self.meta.version) {
            Some(major) if major == kind.supported_major() => {}
            Some(_) => {
                return Err(EtosError::UnsupportedVersion {
                    event_type: self.meta.event_type,
                    version: self.meta.version,
                })
            }
            None => {
                return Err(EtosError::InvalidEvent {
                    reason: format!("malformed version '{}'", self.meta.version),
                })
            }
        }

        let data = EventData::decode(kind, self.data)?;
        Ok(Event::from_parts(self.meta, data, self.links))
    }
}

impl TryFrom<&Event> for RawEvent {
    type Error = EtosError;

    fn try_from(event: &Event) -> Result<Self> {
        Ok(Self {
            meta: event.meta.clone(),
            data: serde_json::to_value(&event.data)?,
            links: event.links.clone(),
        })
    }
}

/// Parse newline-delimited JSON events, skipping blank lines
pub fn parse_jsonl(content: &str) -> Result<Vec<Event>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            Event::from_json(line).map_err(|e| EtosError::InvalidEvent {
                reason: format!("line {}: {}", number + 1, e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(event_type: &str, version: &str, data: Value) -> RawEvent {
        serde_json::from_value(json!({
            "meta": {
                "id": "e1",
                "type": event_type,
                "version": version,
                "time": 0
            },
            "data": data
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_minor_and_patch_are_ignored() {
        let event = raw(
            "EiffelActivityTriggeredEvent",
            "4.3.1",
            json!({"name": "etos"}),
        )
        .decode()
        .unwrap();
        assert_eq!(event.name(), Some("etos"));
        assert!(event.links.is_empty());
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let err = raw("EiffelActivityTriggeredEvent", "4.0.0", json!({}))
            .decode()
            .unwrap_err();
        assert!(matches!(err, EtosError::InvalidEvent { .. }));
    }

    #[test]
    fn test_decode_rejects_malformed_version() {
        let err = raw("EiffelActivityCanceledEvent", "three", json!({}))
            .decode()
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_EVENT");
    }

    #[test]
    fn test_parse_jsonl_reports_line() {
        let good = Event::tercc("s").to_value().unwrap().to_string();
        let content = format!("{}\n\n{{\"meta\": 1}}\n", good);
        let err = parse_jsonl(&content).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
