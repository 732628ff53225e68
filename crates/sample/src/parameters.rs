//! Scenario parameters the publisher supplies before a schedules query.

use std::collections::BTreeMap;

use parley_core::{InputError, KeywordDataset, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::macros::format_description;
use time::Date;

/// Allowed values of `interval`.
pub const INTERVALS: [&str; 3] = ["day", "week", "month"];

pub fn intervals() -> KeywordDataset {
    KeywordDataset::new("intervals", INTERVALS)
}

/// A query parameter a scenario can ask the publisher to supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterParameter {
    Interval,
    Date,
}

impl FilterParameter {
    pub fn query_name(self) -> &'static str {
        match self {
            FilterParameter::Interval => "interval",
            FilterParameter::Date => "date",
        }
    }

    /// Suggested value shown with the prompt.
    pub fn example(self) -> String {
        match self {
            FilterParameter::Interval => "week".to_string(),
            FilterParameter::Date => format_date(time::OffsetDateTime::now_utc().date()),
        }
    }

    fn validate(self, value: &str) -> Result<(), InputError> {
        match self {
            FilterParameter::Interval if !INTERVALS.contains(&value) => Err(InputError::Invalid(
                format!("'{value}' is not one of {}", INTERVALS.join(", ")),
            )),
            FilterParameter::Date => parse_date(value)
                .map(|_| ())
                .ok_or_else(|| InputError::Invalid(format!("'{value}' is not a YYYY-MM-DD date"))),
            _ => Ok(()),
        }
    }
}

fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value, format_description!("[year]-[month]-[day]")).ok()
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

/// Supplied query parameters, by query name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioParameters(BTreeMap<String, String>);

impl ScenarioParameters {
    /// Accept exactly the `expected` parameters, each a valid string value.
    pub fn parse(expected: &[FilterParameter], input: &Value) -> Result<Self, InputError> {
        let Some(object) = input.as_object() else {
            return Err(InputError::Invalid("expected a JSON object".to_string()));
        };
        if let Some(unknown) = object
            .keys()
            .find(|key| !expected.iter().any(|p| p.query_name() == key.as_str()))
        {
            return Err(InputError::Invalid(format!("unexpected parameter '{unknown}'")));
        }
        let mut values = BTreeMap::new();
        for parameter in expected {
            let name = parameter.query_name();
            let value = object
                .get(name)
                .and_then(Value::as_str)
                .ok_or_else(|| InputError::Invalid(format!("missing string parameter '{name}'")))?;
            parameter.validate(value)?;
            values.insert(name.to_string(), value.to_string());
        }
        Ok(Self(values))
    }

    /// Suggested input for the `expected` parameters.
    pub fn example(expected: &[FilterParameter]) -> Self {
        Self(
            expected
                .iter()
                .map(|p| (p.query_name().to_string(), p.example()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Whether `request` carries every supplied parameter with its value.
    pub fn matches_query(&self, request: &Request) -> bool {
        self.iter()
            .all(|(name, value)| matches!(request.query_values(name), [only] if only == value))
    }
}
