//! Captured traffic between two parties.
//!
//! An [`Exchange`] is created once when a request/response pair has been
//! observed and is never mutated afterwards. Its JSON form is the record
//! appended to the session's exchange log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::TrafficError;

/// Header or query-parameter multimap.
pub type Multimap = BTreeMap<String, Vec<String>>;

/// Which half of an exchange a check looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMessageType {
    Request,
    Response,
}

impl HttpMessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMessageType::Request => "request",
            HttpMessageType::Response => "response",
        }
    }
}

/// A message body: JSON when the payload parsed as JSON, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    pub is_json: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

impl MessageBody {
    pub fn json(value: Value) -> Self {
        Self {
            is_json: true,
            json_body: Some(value),
            raw_text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            is_json: false,
            json_body: None,
            raw_text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self::text("")
    }

    /// Build a body from a raw payload, keeping it as JSON when it parses.
    pub fn from_raw(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) if !text.trim().is_empty() => Self::json(value),
            _ => Self::text(text),
        }
    }

    /// The body as JSON; raw text that is not JSON yields `Null`.
    pub fn as_json(&self) -> Value {
        match (&self.json_body, &self.raw_text) {
            (Some(value), _) => value.clone(),
            (None, Some(text)) => serde_json::from_str(text).unwrap_or(Value::Null),
            (None, None) => Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        match (&self.json_body, &self.raw_text) {
            (Some(value), _) => value.is_null(),
            (None, Some(text)) => text.is_empty(),
            (None, None) => true,
        }
    }
}

impl Default for MessageBody {
    fn default() -> Self {
        Self::empty()
    }
}

/// One direction of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub source_party_name: String,
    pub source_party_role: String,
    pub target_party_name: String,
    pub target_party_role: String,
    #[serde(default)]
    pub headers: Multimap,
    #[serde(default)]
    pub body: MessageBody,
    pub timestamp_millis: i64,
}

impl Message {
    pub fn new(
        source_party_name: &str,
        source_party_role: &str,
        target_party_name: &str,
        target_party_role: &str,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            source_party_name: source_party_name.to_string(),
            source_party_role: source_party_role.to_string(),
            target_party_name: target_party_name.to_string(),
            target_party_role: target_party_role.to_string(),
            headers: Multimap::new(),
            body: MessageBody::empty(),
            timestamp_millis,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_json(self, value: Value) -> Self {
        self.with_body(MessageBody::json(value))
    }

    /// All values of a header, matching the name case-insensitively.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub query_params: Multimap,
    pub message: Message,
}

impl Request {
    pub fn new(method: &str, url: &str, message: Message) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            query_params: Multimap::new(),
            message,
        }
    }

    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query_params
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// The URL path without scheme, authority, query or fragment.
    pub fn path(&self) -> &str {
        let without_scheme = match self.url.find("://") {
            Some(i) => &self.url[i + 3..],
            None => self.url.as_str(),
        };
        let path = if self.url.contains("://") {
            match without_scheme.find('/') {
                Some(i) => &without_scheme[i..],
                None => "/",
            }
        } else {
            without_scheme
        };
        let end = path.find(['?', '#']).unwrap_or(path.len());
        &path[..end]
    }

    pub fn query_values(&self, name: &str) -> &[String] {
        self.query_params
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub message: Message,
}

impl Response {
    pub fn new(status_code: u16, message: Message) -> Self {
        Self {
            status_code,
            message,
        }
    }
}

/// One captured request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub id: Uuid,
    pub request: Request,
    pub response: Response,
}

impl Exchange {
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            response,
        }
    }

    pub fn message(&self, kind: HttpMessageType) -> &Message {
        match kind {
            HttpMessageType::Request => &self.request.message,
            HttpMessageType::Response => &self.response.message,
        }
    }

    /// Sort key for the exchange log: fixed-width UTC timestamp of the
    /// request, then the exchange id.
    pub fn log_sort_key(&self) -> Result<String, TrafficError> {
        Ok(format!(
            "{}#{}",
            timestamp_key(self.request.message.timestamp_millis)?,
            self.id
        ))
    }
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`, so lexicographic order is chronological.
pub fn timestamp_key(millis: i64) -> Result<String, TrafficError> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .ok()
        .and_then(|at| at.format(&format).ok())
        .ok_or(TrafficError::TimestampOutOfRange(millis))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> Exchange {
        let request = Request::new(
            "get",
            "https://sandbox.example.com/v1/schedules?date=2024-12-31",
            Message::new("Alice", "Subscriber", "Bob", "Publisher", 1_735_603_200_123)
                .with_header("Api-Version", "1.0.0"),
        )
        .with_query_param("date", "2024-12-31");
        let response = Response::new(
            200,
            Message::new("Bob", "Publisher", "Alice", "Subscriber", 1_735_603_200_456)
                .with_json(json!([{"date": "2024-12-31"}])),
        );
        Exchange::new(request, response)
    }

    #[test]
    fn path_strips_host_and_query() {
        let exchange = sample();
        assert_eq!(exchange.request.method, "GET");
        assert_eq!(exchange.request.path(), "/v1/schedules");
        let relative = Request::new("GET", "/schedules?x=1", exchange.request.message.clone());
        assert_eq!(relative.path(), "/schedules");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let exchange = sample();
        assert_eq!(
            exchange.request.message.header_values("API-VERSION"),
            vec!["1.0.0"]
        );
        assert!(exchange.response.message.header_values("Api-Version").is_empty());
    }

    #[test]
    fn wire_format_uses_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["request"]["queryParams"]["date"], json!(["2024-12-31"]));
        assert_eq!(json["response"]["statusCode"], 200);
        assert_eq!(json["response"]["message"]["body"]["isJson"], true);
        assert_eq!(json["request"]["message"]["sourcePartyRole"], "Subscriber");
        let back: Exchange = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_with_id(back.id));
    }

    fn sample_with_id(id: Uuid) -> Exchange {
        Exchange { id, ..sample() }
    }

    #[test]
    fn sort_key_orders_chronologically() {
        assert_eq!(
            timestamp_key(1_735_603_200_123).unwrap(),
            "2024-12-31T00:00:00.123Z"
        );
        assert!(timestamp_key(999).unwrap() < timestamp_key(1_000).unwrap());
        let key = sample().log_sort_key().unwrap();
        assert!(key.starts_with("2024-12-31T00:00:00.123Z#"));
    }

    #[test]
    fn raw_body_keeps_text_when_not_json() {
        assert!(MessageBody::from_raw("{\"a\":1}").is_json);
        let text = MessageBody::from_raw("not json");
        assert!(!text.is_json);
        assert_eq!(text.as_json(), Value::Null);
        assert!(MessageBody::from_raw("").is_empty());
    }
}
