use super::{CheckResult, ExchangeCheck};
use crate::error::CheckError;
use crate::traffic::{Exchange, HttpMessageType, Message};

/// Name of the header carrying the API version of a message.
pub const API_VERSION_HEADER: &str = "API-Version";

// ──────────────────────────────────────────────
// URL path
// ──────────────────────────────────────────────

/// The request path ends with one of the expected suffixes.
#[derive(Debug, Clone)]
pub struct UrlPathCheck {
    suffixes: Vec<String>,
}

impl UrlPathCheck {
    pub fn new(suffix: &str) -> Self {
        Self::any_of(&[suffix])
    }

    pub fn any_of(suffixes: &[&str]) -> Self {
        Self {
            suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ExchangeCheck for UrlPathCheck {
    fn title(&self) -> String {
        "The URL path of the HTTP request is correct".to_string()
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let path = exchange.request.path();
        if self.suffixes.iter().any(|suffix| path.ends_with(suffix.as_str())) {
            return Ok(CheckResult::ok());
        }
        let url = &exchange.request.url;
        Ok(CheckResult::error(match self.suffixes.as_slice() {
            [single] => format!("Request URL '{url}' does not end with '{single}'"),
            many => format!(
                "Request URL '{url}' does not end with any of [{}]",
                many.join(", ")
            ),
        }))
    }
}

// ──────────────────────────────────────────────
// Response status
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ResponseStatusCheck {
    expected: Vec<u16>,
}

impl ResponseStatusCheck {
    pub fn new(expected: u16) -> Self {
        Self::any_of(&[expected])
    }

    pub fn any_of(expected: &[u16]) -> Self {
        let mut expected = expected.to_vec();
        expected.sort_unstable();
        expected.dedup();
        Self { expected }
    }
}

impl ExchangeCheck for ResponseStatusCheck {
    fn title(&self) -> String {
        "The HTTP response status is correct".to_string()
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let actual = exchange.response.status_code;
        if self.expected.contains(&actual) {
            return Ok(CheckResult::ok());
        }
        Ok(CheckResult::error(match self.expected.as_slice() {
            [single] => format!(
                "Response status '{actual}' does not match the expected value '{single}'"
            ),
            many => format!(
                "Response status '{actual}' does not match one of the expected values: '{}'",
                many.iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }))
    }
}

// ──────────────────────────────────────────────
// Headers and query parameters
// ──────────────────────────────────────────────

/// Shared logic of single-valued header and query-parameter checks.
fn single_value_errors(
    what: &str,
    name: &str,
    expected: Option<&str>,
    values: &[&str],
) -> CheckResult {
    match (values, expected) {
        ([], None) => CheckResult::error(format!("Missing the {what} '{name}'")),
        ([], Some(expected)) => CheckResult::error(format!(
            "Missing the {what} '{name}' (which should be set to '{expected}')"
        )),
        ([_], None) => CheckResult::ok(),
        ([actual], Some(expected)) if *actual == expected => CheckResult::ok(),
        ([actual], Some(expected)) => CheckResult::error(format!(
            "The {what} '{name}' should have been '{expected}' but was '{actual}'"
        )),
        _ => CheckResult::error(format!("The {what} '{name}' should be given exactly once")),
    }
}

/// A header is present exactly once, optionally with a given value.
/// Header names compare case-insensitively.
#[derive(Debug, Clone)]
pub struct HeaderCheck {
    message_type: HttpMessageType,
    name: String,
    expected: Option<String>,
}

impl HeaderCheck {
    pub fn present(message_type: HttpMessageType, name: &str) -> Self {
        Self {
            message_type,
            name: name.to_string(),
            expected: None,
        }
    }

    pub fn equals(message_type: HttpMessageType, name: &str, value: &str) -> Self {
        Self {
            message_type,
            name: name.to_string(),
            expected: Some(value.to_string()),
        }
    }
}

impl ExchangeCheck for HeaderCheck {
    fn title(&self) -> String {
        match self.expected {
            None => format!("The header '{}' is present", self.name),
            Some(_) => format!("The value of header '{}' is correct", self.name),
        }
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let values = exchange.message(self.message_type).header_values(&self.name);
        Ok(single_value_errors(
            "header",
            &self.name,
            self.expected.as_deref(),
            &values,
        ))
    }
}

/// A request query parameter is present exactly once, optionally with a
/// given value.
#[derive(Debug, Clone)]
pub struct QueryParamCheck {
    name: String,
    expected: Option<String>,
}

impl QueryParamCheck {
    pub fn present(name: &str) -> Self {
        Self {
            name: name.to_string(),
            expected: None,
        }
    }

    pub fn equals(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            expected: Some(value.to_string()),
        }
    }
}

impl ExchangeCheck for QueryParamCheck {
    fn title(&self) -> String {
        match self.expected {
            None => format!("The query parameter '{}' is present", self.name),
            Some(_) => format!("The value of query parameter '{}' is correct", self.name),
        }
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let values: Vec<&str> = exchange
            .request
            .query_values(&self.name)
            .iter()
            .map(String::as_str)
            .collect();
        Ok(single_value_errors(
            "query parameter",
            &self.name,
            self.expected.as_deref(),
            &values,
        ))
    }
}

// ──────────────────────────────────────────────
// API-Version
// ──────────────────────────────────────────────

/// The `API-Version` header matches the standard's version.
///
/// Suffixes such as `-beta` are ignored. Regular requests only have to agree
/// on the major version; responses and notification requests must carry the
/// full version. A missing header is an error only on regular responses.
#[derive(Debug, Clone)]
pub struct ApiHeaderCheck {
    message_type: HttpMessageType,
    expected_version: String,
    notification: bool,
}

impl ApiHeaderCheck {
    pub fn new(message_type: HttpMessageType, expected_version: &str) -> Self {
        Self {
            message_type,
            expected_version: expected_version.to_string(),
            notification: false,
        }
    }

    pub fn notification(message_type: HttpMessageType, expected_version: &str) -> Self {
        Self {
            notification: true,
            ..Self::new(message_type, expected_version)
        }
    }

    fn compare(&self, actual: &str) -> CheckResult {
        let (expected, actual) = match (self.message_type, self.notification) {
            (HttpMessageType::Request, false) => (major(&self.expected_version), major(actual)),
            _ => (self.expected_version.as_str(), actual),
        };
        if expected == actual {
            CheckResult::ok()
        } else {
            CheckResult::error(format!(
                "Expected {API_VERSION_HEADER} '{expected}' but found '{actual}'"
            ))
        }
    }
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

fn strip_suffix(version: &str) -> &str {
    version.split('-').next().unwrap_or(version)
}

impl ExchangeCheck for ApiHeaderCheck {
    fn title(&self) -> String {
        format!(
            "The HTTP {} has a correct {API_VERSION_HEADER} header",
            self.message_type.as_str()
        )
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let message: &Message = exchange.message(self.message_type);
        match message.header_values(API_VERSION_HEADER).as_slice() {
            [] if self.message_type == HttpMessageType::Response && !self.notification => Ok(
                CheckResult::error(format!("Missing {API_VERSION_HEADER} header")),
            ),
            [] => Ok(CheckResult::ok()),
            [value] => Ok(self.compare(strip_suffix(value))),
            _ => Ok(CheckResult::error(format!(
                "Duplicate {API_VERSION_HEADER} headers"
            ))),
        }
    }
}
