use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{render_pointer, CheckResult, ExchangeCheck};
use crate::error::CheckError;
use crate::traffic::{Exchange, HttpMessageType};

type RuleFn = Arc<dyn Fn(&Value) -> Result<CheckResult, CheckError> + Send + Sync>;

/// A named set of permitted keyword values, e.g. the allowed `interval`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordDataset {
    name: String,
    values: BTreeSet<String>,
}

impl KeywordDataset {
    pub fn new<'a>(name: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: name.to_string(),
            values: values.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }
}

/// One content rule applied to a JSON document.
///
/// Pointers use RFC 6901 syntax (`/schedules/0/date`) and are rendered with
/// dots in messages.
#[derive(Clone)]
pub struct JsonRule {
    description: String,
    eval: RuleFn,
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        None => "(absent)".to_string(),
        Some(Value::Null) => "(null)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

impl JsonRule {
    pub fn custom(
        description: &str,
        eval: impl Fn(&Value) -> Result<CheckResult, CheckError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.to_string(),
            eval: Arc::new(eval),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn apply(&self, document: &Value) -> Result<CheckResult, CheckError> {
        (self.eval)(document)
    }

    pub fn must_equal(pointer: &str, expected: Value) -> Self {
        Self::must_equal_with(pointer, move || Some(expected.clone()))
    }

    /// Like [`must_equal`](Self::must_equal) with the expected value read at
    /// evaluation time, typically from a [`Slot`](crate::Slot) filled by an
    /// earlier action. An unset value is an evaluation error, since it means
    /// the scenario never recorded what it now relies on.
    pub fn must_equal_with(
        pointer: &str,
        expected: impl Fn() -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        let pointer = pointer.to_string();
        let path = render_pointer(&pointer);
        Self::custom(&format!("The value of '{path}' is correct"), move |doc| {
            let expected = expected().ok_or_else(|| {
                CheckError::Evaluation(format!(
                    "The expected value of '{path}' was never recorded by the scenario"
                ))
            })?;
            let actual = doc.pointer(&pointer);
            if actual == Some(&expected) {
                return Ok(CheckResult::ok());
            }
            Ok(CheckResult::error(format!(
                "The value of '{path}' was '{}' instead of '{}'",
                render_value(actual),
                render_value(Some(&expected))
            )))
        })
    }

    pub fn must_be_present(pointer: &str) -> Self {
        let pointer = pointer.to_string();
        let path = render_pointer(&pointer);
        Self::custom(&format!("The attribute '{path}' is present"), move |doc| {
            Ok(match doc.pointer(&pointer) {
                Some(_) => CheckResult::ok(),
                None => CheckResult::error(format!(
                    "The attribute '{path}' should have been present but was absent"
                )),
            })
        })
    }

    /// Absent means missing; an explicit `null` counts as present.
    pub fn must_be_absent(pointer: &str) -> Self {
        let pointer = pointer.to_string();
        let path = render_pointer(&pointer);
        Self::custom(&format!("The attribute '{path}' is absent"), move |doc| {
            Ok(match doc.pointer(&pointer) {
                None => CheckResult::ok(),
                Some(value) => CheckResult::error(format!(
                    "The attribute '{path}' should have been absent but was present and had value '{}'",
                    render_value(Some(value))
                )),
            })
        })
    }

    /// The attribute, when present, is one of the dataset's keywords.
    pub fn must_be_keyword(pointer: &str, dataset: KeywordDataset) -> Self {
        let pointer = pointer.to_string();
        let path = render_pointer(&pointer);
        Self::custom(
            &format!("The attribute '{path}' is a valid {}", dataset.name()),
            move |doc| {
                let Some(value) = doc.pointer(&pointer) else {
                    return Ok(CheckResult::ok());
                };
                if value.as_str().is_some_and(|text| dataset.contains(text)) {
                    return Ok(CheckResult::ok());
                }
                Ok(CheckResult::error(format!(
                    "The attribute '{path}' had value '{}' which was not a valid keyword here.",
                    render_value(Some(value))
                )))
            },
        )
    }

    /// At least one element of the array at `array_pointer` satisfies
    /// `predicate`.
    ///
    /// With `irrelevant_when_empty`, a missing or empty array makes the rule
    /// not apply instead of failing.
    pub fn at_least_one(
        array_pointer: &str,
        description: &str,
        irrelevant_when_empty: bool,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        let pointer = array_pointer.to_string();
        Self::custom(description, move |doc| {
            let elements = match doc.pointer(&pointer) {
                Some(Value::Array(elements)) if !elements.is_empty() => elements,
                _ if irrelevant_when_empty => return Ok(CheckResult::irrelevant()),
                _ => return Ok(CheckResult::error("No elements matched the specified path")),
            };
            if elements.iter().any(&predicate) {
                return Ok(CheckResult::ok());
            }
            Ok(CheckResult::error(format!(
                "At least one element must satisfy the validation, but all {} element(s) failed",
                elements.len()
            )))
        })
    }

    /// Apply `rule` to every element of the array at `array_pointer`,
    /// prefixing messages with the element position.
    pub fn all_items(array_pointer: &str, rule: JsonRule) -> Self {
        let pointer = array_pointer.to_string();
        let path = render_pointer(&pointer);
        Self::custom(
            &format!("Every element of '{path}': {}", rule.description),
            move |doc| {
                let Some(Value::Array(elements)) = doc.pointer(&pointer) else {
                    return Ok(CheckResult::ok());
                };
                let mut result = CheckResult::ok();
                for (index, element) in elements.iter().enumerate() {
                    let item = rule.apply(element)?;
                    for error in item.errors {
                        result.push_error(format!("{path}[{index}]: {error}"));
                    }
                }
                Ok(result)
            },
        )
    }

    /// Two attributes must be consistent with each other. Skipped when either
    /// is absent.
    pub fn cross_field(
        first: &str,
        second: &str,
        description: &str,
        consistent: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        let (first, second) = (first.to_string(), second.to_string());
        let message = format!(
            "The attributes '{}' and '{}' are inconsistent: {description}",
            render_pointer(&first),
            render_pointer(&second)
        );
        Self::custom(description, move |doc| {
            match (doc.pointer(&first), doc.pointer(&second)) {
                (Some(a), Some(b)) if !consistent(a, b) => Ok(CheckResult::error(message.clone())),
                _ => Ok(CheckResult::ok()),
            }
        })
    }

    /// The string at `checksum_pointer` is the hex SHA-256 of the canonical
    /// JSON of the value at `content_pointer`.
    pub fn checksum_matches(content_pointer: &str, checksum_pointer: &str) -> Self {
        let content_pointer = content_pointer.to_string();
        let checksum_pointer = checksum_pointer.to_string();
        let content_path = render_pointer(&content_pointer);
        let checksum_path = render_pointer(&checksum_pointer);
        Self::custom(
            &format!("The checksum of '{content_path}' is correct"),
            move |doc| {
                let (Some(content), Some(declared)) =
                    (doc.pointer(&content_pointer), doc.pointer(&checksum_pointer))
                else {
                    return Ok(CheckResult::irrelevant());
                };
                let actual = sha256_hex(content);
                if declared.as_str() == Some(actual.as_str()) {
                    return Ok(CheckResult::ok());
                }
                Ok(CheckResult::error(format!(
                    "The checksum in '{checksum_path}' was '{}' but the SHA-256 of '{content_path}' is '{actual}'",
                    render_value(Some(declared))
                )))
            },
        )
    }
}

impl fmt::Debug for JsonRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRule")
            .field("description", &self.description)
            .finish()
    }
}

/// Hex SHA-256 of the canonical (key-sorted, compact) JSON form of `value`.
pub fn sha256_hex(value: &Value) -> String {
    let digest = Sha256::digest(canonical(value).to_string().as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Object(
                keys.into_iter()
                    .map(|key| (key.clone(), canonical(&map[key])))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// Content rules applied to the JSON body of one message.
#[derive(Debug, Clone)]
pub struct JsonContentCheck {
    title: String,
    message_type: HttpMessageType,
    rules: Vec<JsonRule>,
}

impl JsonContentCheck {
    pub fn new(title: &str, message_type: HttpMessageType, rules: Vec<JsonRule>) -> Self {
        Self {
            title: title.to_string(),
            message_type,
            rules,
        }
    }
}

impl ExchangeCheck for JsonContentCheck {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn check(&self, exchange: &Exchange) -> Result<CheckResult, CheckError> {
        let body = &exchange.message(self.message_type).body;
        if !body.is_json {
            return Ok(CheckResult::error(format!(
                "The HTTP {} body is not JSON",
                self.message_type.as_str()
            )));
        }
        let document = body.as_json();
        let mut result = CheckResult::irrelevant();
        for rule in &self.rules {
            result = result.merge(rule.apply(&document)?);
        }
        if self.rules.is_empty() {
            result = CheckResult::ok();
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn errors(rule: &JsonRule, doc: Value) -> Vec<String> {
        rule.apply(&doc).unwrap().errors
    }

    #[test]
    fn must_equal_reports_actual_and_expected() {
        let rule = JsonRule::must_equal("/interval", json!("week"));
        assert!(errors(&rule, json!({"interval": "week"})).is_empty());
        assert_eq!(
            errors(&rule, json!({"interval": "day"})),
            vec!["The value of 'interval' was 'day' instead of 'week'"]
        );
        assert_eq!(
            errors(&rule, json!({})),
            vec!["The value of 'interval' was '(absent)' instead of 'week'"]
        );
    }

    #[test]
    fn must_equal_with_unset_value_is_an_evaluation_error() {
        let rule = JsonRule::must_equal_with("/ref", || None);
        assert!(matches!(
            rule.apply(&json!({"ref": "x"})),
            Err(CheckError::Evaluation(_))
        ));
    }

    #[test]
    fn presence_and_absence() {
        let present = JsonRule::must_be_present("/a/b");
        let absent = JsonRule::must_be_absent("/a/b");
        assert!(errors(&present, json!({"a": {"b": null}})).is_empty());
        assert_eq!(
            errors(&present, json!({"a": {}})),
            vec!["The attribute 'a.b' should have been present but was absent"]
        );
        assert_eq!(
            errors(&absent, json!({"a": {"b": 3}})),
            vec!["The attribute 'a.b' should have been absent but was present and had value '3'"]
        );
    }

    #[test]
    fn keywords() {
        let rule = JsonRule::must_be_keyword(
            "/interval",
            KeywordDataset::new("interval", ["day", "week", "month"]),
        );
        assert!(errors(&rule, json!({"interval": "week"})).is_empty());
        assert!(errors(&rule, json!({})).is_empty());
        assert_eq!(
            errors(&rule, json!({"interval": "year"})),
            vec!["The attribute 'interval' had value 'year' which was not a valid keyword here."]
        );
    }

    #[test]
    fn at_least_one_match() {
        let rule = JsonRule::at_least_one("/items", "some item is due", false, |item| {
            item["due"] == json!(true)
        });
        assert!(errors(&rule, json!({"items": [{"due": false}, {"due": true}]})).is_empty());
        assert_eq!(
            errors(&rule, json!({"items": [{"due": false}, {}]})),
            vec!["At least one element must satisfy the validation, but all 2 element(s) failed"]
        );
        assert_eq!(
            errors(&rule, json!({"items": []})),
            vec!["No elements matched the specified path"]
        );
        let lenient = JsonRule::at_least_one("/items", "x", true, |_| false);
        assert!(!lenient.apply(&json!({})).unwrap().relevant);
    }

    #[test]
    fn all_items_prefixes_positions() {
        let rule = JsonRule::all_items("/items", JsonRule::must_be_present("/id"));
        assert_eq!(
            errors(&rule, json!({"items": [{"id": 1}, {}]})),
            vec!["items[1]: The attribute 'id' should have been present but was absent"]
        );
    }

    #[test]
    fn cross_field_consistency() {
        let rule = JsonRule::cross_field("/from", "/to", "'from' must not be after 'to'", |a, b| {
            a.as_str() <= b.as_str()
        });
        assert!(errors(&rule, json!({"from": "2024-01-01", "to": "2024-02-01"})).is_empty());
        assert_eq!(errors(&rule, json!({"from": "2024-03-01", "to": "2024-02-01"})).len(), 1);
        assert!(errors(&rule, json!({"from": "2024-03-01"})).is_empty());
    }

    #[test]
    fn checksum_uses_canonical_json() {
        let content = json!({"b": 2, "a": [1, {"d": 4, "c": 3}]});
        let reordered: Value =
            serde_json::from_str(r#"{"a":[1,{"c":3,"d":4}],"b":2}"#).unwrap();
        assert_eq!(sha256_hex(&content), sha256_hex(&reordered));

        let rule = JsonRule::checksum_matches("/document", "/checksum");
        let good = json!({"document": content, "checksum": sha256_hex(&content)});
        assert!(errors(&rule, good).is_empty());
        let bad = json!({"document": content, "checksum": "00"});
        assert_eq!(errors(&rule, bad).len(), 1);
    }

    #[test]
    fn content_check_merges_rules() {
        use crate::traffic::{Message, Request, Response};
        let message = Message::new("a", "A", "b", "B", 0);
        let exchange = Exchange::new(
            Request::new("GET", "/x", message.clone()),
            Response::new(200, message.with_json(json!({"interval": "day"}))),
        );
        let check = JsonContentCheck::new(
            "The response content is correct",
            HttpMessageType::Response,
            vec![
                JsonRule::must_equal("/interval", json!("week")),
                JsonRule::must_be_present("/date"),
            ],
        );
        let result = check.check(&exchange).unwrap();
        assert!(result.relevant);
        assert_eq!(result.errors.len(), 2);
    }
}
