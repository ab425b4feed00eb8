//! GraphQL event repository
//!
//! Queries an Eiffel GraphQL API for the relations the collector needs.
//! Each query is a `search` filter over one event type; matching documents
//! come back as `edges[].node.reduced`, which the API encodes either as a
//! JSON object or as a JSON string.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{EventRepository, QueryContext};
use crate::error::{EtosError, Result};
use crate::events::{link_type, Event};

/// Default per-request timeout when the query context has no deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct GraphQlRepository {
    endpoint: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

impl GraphQlRepository {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(transport)?;
        Ok(Self::with_client(endpoint, http))
    }

    pub fn with_client(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn search(
        &self,
        ctx: &QueryContext,
        field: &str,
        search: Value,
        last: Option<u32>,
    ) -> Result<Vec<Event>> {
        let body = search_request(field, &search, last);
        tracing::trace!("GraphQL {} search {}", field, search);

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtosError::Transport {
                reason: format!("{} answered {}", self.endpoint, status),
            });
        }

        let payload: Value = response.json().await.map_err(transport)?;
        parse_search_response(field, payload)
    }

    async fn search_one(
        &self,
        ctx: &QueryContext,
        field: &str,
        search: Value,
    ) -> Result<Option<Event>> {
        Ok(self.search(ctx, field, search, Some(1)).await?.into_iter().next())
    }
}

fn transport(err: reqwest::Error) -> EtosError {
    EtosError::Transport {
        reason: err.to_string(),
    }
}

/// Filter matching events that carry a link of `link` type to `target`
fn linked_to(link: &str, target: &str) -> Value {
    json!({ "links": { "$elemMatch": { "type": link, "target": target } } })
}

fn search_request(field: &str, search: &Value, last: Option<u32>) -> Value {
    let query = format!(
        "query Search($search: String!, $last: Int) {{ {}(search: $search, last: $last) {{ edges {{ node {{ reduced }} }} }} }}",
        field
    );
    json!({
        "query": query,
        "variables": { "search": search.to_string(), "last": last },
    })
}

/// Decode the events out of a GraphQL search answer
pub fn parse_search_response(field: &str, payload: Value) -> Result<Vec<Event>> {
    let response: GraphQlResponse = serde_json::from_value(payload)?;
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(EtosError::Transport {
            reason: messages.join("; "),
        });
    }

    let edges = match response
        .data
        .as_ref()
        .and_then(|data| data.get(field))
        .and_then(|connection| connection.get("edges"))
        .and_then(Value::as_array)
    {
        Some(edges) => edges,
        None => return Ok(Vec::new()),
    };

    edges
        .iter()
        .filter_map(|edge| edge.get("node").and_then(|node| node.get("reduced")))
        .map(|reduced| match reduced {
            Value::String(encoded) => Event::from_json(encoded),
            other => Event::from_value(other.clone()),
        })
        .collect()
}

#[async_trait]
impl EventRepository for GraphQlRepository {
    async fn request_tercc(&self, ctx: &QueryContext, id: &str) -> Result<Option<Event>> {
        self.search_one(
            ctx,
            "testExecutionRecipeCollectionCreated",
            json!({ "meta.id": id }),
        )
        .await
    }

    async fn request_activity_triggered(
        &self,
        ctx: &QueryContext,
        tercc_id: &str,
    ) -> Result<Option<Event>> {
        self.search_one(ctx, "activityTriggered", linked_to(link_type::CAUSE, tercc_id))
            .await
    }

    async fn request_activity_canceled(
        &self,
        ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Option<Event>> {
        self.search_one(
            ctx,
            "activityCanceled",
            linked_to(link_type::ACTIVITY_EXECUTION, activity_id),
        )
        .await
    }

    async fn request_activity_finished(
        &self,
        ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Option<Event>> {
        self.search_one(
            ctx,
            "activityFinished",
            linked_to(link_type::ACTIVITY_EXECUTION, activity_id),
        )
        .await
    }

    async fn request_main_suites_started(
        &self,
        ctx: &QueryContext,
        activity_id: &str,
    ) -> Result<Vec<Event>> {
        self.search(
            ctx,
            "testSuiteStarted",
            linked_to(link_type::CONTEXT, activity_id),
            None,
        )
        .await
    }

    async fn request_sub_suites_started(
        &self,
        ctx: &QueryContext,
        main_suite_id: &str,
    ) -> Result<Vec<Event>> {
        self.search(
            ctx,
            "testSuiteStarted",
            linked_to(link_type::CONTEXT, main_suite_id),
            None,
        )
        .await
    }

    async fn request_test_suite_finished(
        &self,
        ctx: &QueryContext,
        suite_id: &str,
    ) -> Result<Option<Event>> {
        self.search_one(
            ctx,
            "testSuiteFinished",
            linked_to(link_type::TEST_SUITE_EXECUTION, suite_id),
        )
        .await
    }

    fn name(&self) -> &'static str {
        "graphql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn test_parse_reduced_as_object_and_string() {
        let tercc = Event::tercc("strategy");
        let value = tercc.to_value().unwrap();
        let payload = json!({
            "data": {
                "testExecutionRecipeCollectionCreated": {
                    "edges": [
                        { "node": { "reduced": value } },
                        { "node": { "reduced": value.to_string() } }
                    ]
                }
            }
        });
        let events =
            parse_search_response("testExecutionRecipeCollectionCreated", payload).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind() == EventKind::Tercc));
        assert_eq!(events[0], events[1]);
    }

    #[test]
    fn test_parse_empty_and_missing_connection() {
        let payload = json!({ "data": { "activityTriggered": { "edges": [] } } });
        assert!(parse_search_response("activityTriggered", payload)
            .unwrap()
            .is_empty());

        let payload = json!({ "data": null });
        assert!(parse_search_response("activityTriggered", payload)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_graphql_errors_are_transport_failures() {
        let payload = json!({ "errors": [{ "message": "boom" }] });
        let err = parse_search_response("activityTriggered", payload).unwrap_err();
        assert_eq!(err.error_code(), "TRANSPORT_ERROR");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_parse_undecodable_event_is_decode_error() {
        let payload = json!({
            "data": { "activityTriggered": { "edges": [
                { "node": { "reduced": { "meta": { "id": "x", "type": "Nope", "version": "1.0.0", "time": 0 } } } }
            ] } }
        });
        let err = parse_search_response("activityTriggered", payload).unwrap_err();
        assert!(matches!(err, EtosError::UnknownEventType { .. }));
    }

    #[test]
    fn test_search_request_shape() {
        let body = search_request("testSuiteFinished", &linked_to("TEST_SUITE_EXECUTION", "s1"), Some(1));
        assert!(body["query"].as_str().unwrap().contains("testSuiteFinished(search: $search"));
        let search: Value =
            serde_json::from_str(body["variables"]["search"].as_str().unwrap()).unwrap();
        assert_eq!(search["links"]["$elemMatch"]["target"], "s1");
        assert_eq!(body["variables"]["last"], 1);
    }
}
