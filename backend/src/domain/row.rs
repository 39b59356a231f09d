//! Schemaless rows returned by the remote store.
//!
//! The store enforces no schema, so every cell is a [`FieldValue`]. Consumers
//! coerce the fields they care about and treat a failed coercion as an
//! absent value rather than an error.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RowId;

/// Naive timestamp layouts accepted in addition to RFC 3339. Values without
/// an offset are read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One cell of a row.
///
/// Link-row fields come back as lists and select options as maps; both are
/// kept so rows round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// JSON `null`.
    Null,
    /// Boolean cell.
    Bool(bool),
    /// Numeric cell.
    Number(serde_json::Number),
    /// Text cell, including dates and decimals rendered as text.
    Text(String),
    /// Multi-valued cell.
    List(Vec<FieldValue>),
    /// Structured cell such as a select option.
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Borrow the text content, if this is a text cell.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Coerce the cell into an exact decimal.
    ///
    /// Numbers convert directly. Text converts from its longest leading
    /// `[+-]digits[.digits][e[+-]digits]` run once surrounding whitespace is
    /// trimmed, so `"100.50 EUR"` reads as 100.50. Text without a numeric
    /// prefix and every other cell is `None`.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::FieldValue;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(FieldValue::from(" 12.50 ").to_decimal(), Some(Decimal::new(1250, 2)));
    /// assert_eq!(FieldValue::from("20 EUR").to_decimal(), Some(Decimal::new(20, 0)));
    /// assert_eq!(FieldValue::from("n/a").to_decimal(), None);
    /// ```
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Number(number) => parse_decimal(&number.to_string()),
            Self::Text(text) => parse_decimal(text.trim()),
            Self::Null | Self::Bool(_) | Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Coerce the cell into a UTC instant.
    ///
    /// Accepts RFC 3339 text, naive date-times and bare dates (read as UTC),
    /// and integer epoch milliseconds.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::FieldValue;
    ///
    /// let midnight = FieldValue::from("2026-03-01").to_timestamp().expect("date parses");
    /// assert_eq!(midnight.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    /// assert!(FieldValue::from("soon").to_timestamp().is_none());
    /// ```
    pub fn to_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Text(text) => parse_timestamp(text.trim()),
            Self::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
            Self::Null | Self::Bool(_) | Self::List(_) | Self::Map(_) => None,
        }
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let number = numeric_prefix(raw)?;
    Decimal::from_str(number)
        .or_else(|_| Decimal::from_scientific(number))
        .ok()
}

/// Longest leading `[+-]digits[.digits][e[+-]digits]` run of `raw`. A dot or
/// exponent marker without digits after it is not part of the run.
fn numeric_prefix(raw: &str) -> Option<&str> {
    let bytes = raw.as_bytes();
    let digits_from = |start: usize| {
        bytes
            .get(start..)
            .map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let integral = digits_from(end);
    if integral == 0 {
        return None;
    }
    end += integral;

    if bytes.get(end) == Some(&b'.') {
        let fraction = digits_from(end + 1);
        if fraction > 0 {
            end += 1 + fraction;
        }
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exponent = digits_from(end + 1 + sign);
        if exponent > 0 {
            end += 1 + sign + exponent;
        }
    }
    raw.get(..end)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Text(value.to_rfc3339())
    }
}

/// Field bag used for create and update payloads.
pub type RowFields = BTreeMap<String, FieldValue>;

/// A schemaless row keyed by user-facing field names.
///
/// # Examples
/// ```
/// use backend::domain::{Row, RowId};
///
/// let row = Row::new().with("id", 7_i64).with("status", "Paid");
/// assert_eq!(row.id(), Some(RowId::new(7)));
/// assert_eq!(row.text("status"), Some("Paid"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(RowFields);

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace one field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Borrow a raw field.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Store-assigned row identifier, when present and integral.
    pub fn id(&self) -> Option<RowId> {
        match self.get("id") {
            Some(FieldValue::Number(number)) => number.as_i64().map(RowId::new),
            _ => None,
        }
    }

    /// Borrow a text field.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Coerce a field into a UTC instant; see [`FieldValue::to_timestamp`].
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key).and_then(FieldValue::to_timestamp)
    }

    /// Coerce a field into a decimal; see [`FieldValue::to_decimal`].
    pub fn decimal(&self, key: &str) -> Option<Decimal> {
        self.get(key).and_then(FieldValue::to_decimal)
    }
}

impl From<RowFields> for Row {
    fn from(fields: RowFields) -> Self {
        Self(fields)
    }
}
