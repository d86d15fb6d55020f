//! Attribute values.
//!
//! Every attribute fact carries a typed value. The value space is a
//! closed tagged union over value kind and array-ness, so every
//! consumption site (constraints, matching, codecs) handles it
//! exhaustively instead of inspecting runtime types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// The kind of an attribute value, independent of array-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValueType {
    /// Single-line text.
    Text,
    /// Multi-line text; matched and constrained like text.
    MultilineText,
    /// 64-bit signed integer.
    Integer,
    /// Arbitrary JSON document.
    Json,
}

impl fmt::Display for AttributeValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::MultilineText => write!(f, "multiline_text"),
            Self::Integer => write!(f, "integer"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// A typed attribute value: scalar or array of one kind.
///
/// # Examples
///
/// ```
/// use stratum::{AttributeValue, AttributeValueType};
///
/// let host = AttributeValue::Text("web-01".to_string());
/// assert_eq!(host.value_type(), AttributeValueType::Text);
/// assert!(!host.is_array());
///
/// let cpus = AttributeValue::IntegerArray(vec![4, 8]);
/// assert!(cpus.is_array());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Text(String),
    MultilineText(String),
    Integer(i64),
    Json(serde_json::Value),
    TextArray(Vec<String>),
    MultilineTextArray(Vec<String>),
    IntegerArray(Vec<i64>),
    JsonArray(Vec<serde_json::Value>),
}

impl AttributeValue {
    /// Returns the value kind, ignoring array-ness.
    #[must_use]
    pub const fn value_type(&self) -> AttributeValueType {
        match self {
            Self::Text(_) | Self::TextArray(_) => AttributeValueType::Text,
            Self::MultilineText(_) | Self::MultilineTextArray(_) => {
                AttributeValueType::MultilineText
            }
            Self::Integer(_) | Self::IntegerArray(_) => AttributeValueType::Integer,
            Self::Json(_) | Self::JsonArray(_) => AttributeValueType::Json,
        }
    }

    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(
            self,
            Self::TextArray(_)
                | Self::MultilineTextArray(_)
                | Self::IntegerArray(_)
                | Self::JsonArray(_)
        )
    }

    /// Number of elements for arrays, `None` for scalars.
    #[must_use]
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Self::TextArray(v) | Self::MultilineTextArray(v) => Some(v.len()),
            Self::IntegerArray(v) => Some(v.len()),
            Self::JsonArray(v) => Some(v.len()),
            Self::Text(_) | Self::MultilineText(_) | Self::Integer(_) | Self::Json(_) => None,
        }
    }

    /// The textual items of a text-kinded value: one item for a scalar,
    /// the elements for an array. `None` for non-text kinds.
    ///
    /// Text constraints (length, regex) apply per item.
    #[must_use]
    pub fn text_items(&self) -> Option<Vec<&str>> {
        match self {
            Self::Text(s) | Self::MultilineText(s) => Some(vec![s.as_str()]),
            Self::TextArray(v) | Self::MultilineTextArray(v) => {
                Some(v.iter().map(String::as_str).collect())
            }
            Self::Integer(_) | Self::IntegerArray(_) | Self::Json(_) | Self::JsonArray(_) => None,
        }
    }

    /// Encodes the value into raw strings: one for scalars, one per
    /// element for arrays.
    #[must_use]
    pub fn to_raw_strings(&self) -> Vec<String> {
        match self {
            Self::Text(s) | Self::MultilineText(s) => vec![s.clone()],
            Self::Integer(i) => vec![i.to_string()],
            Self::Json(j) => vec![j.to_string()],
            Self::TextArray(v) | Self::MultilineTextArray(v) => v.clone(),
            Self::IntegerArray(v) => v.iter().map(ToString::to_string).collect(),
            Self::JsonArray(v) => v.iter().map(ToString::to_string).collect(),
        }
    }

    /// Decodes a value of the given kind and array-ness from raw strings.
    ///
    /// Scalars require exactly one raw string; arrays accept any number.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError`] on arity mismatch or when a raw string does
    /// not parse as the requested kind.
    pub fn from_raw_strings(
        value_type: AttributeValueType,
        is_array: bool,
        raw: &[String],
    ) -> Result<Self, ValueError> {
        if is_array {
            match value_type {
                AttributeValueType::Text => Ok(Self::TextArray(raw.to_vec())),
                AttributeValueType::MultilineText => Ok(Self::MultilineTextArray(raw.to_vec())),
                AttributeValueType::Integer => {
                    let parsed = raw
                        .iter()
                        .map(|s| parse_integer(s))
                        .collect::<Result<Vec<i64>, ValueError>>()?;
                    Ok(Self::IntegerArray(parsed))
                }
                AttributeValueType::Json => {
                    let parsed = raw
                        .iter()
                        .map(|s| parse_json(s))
                        .collect::<Result<Vec<serde_json::Value>, ValueError>>()?;
                    Ok(Self::JsonArray(parsed))
                }
            }
        } else {
            let [single] = raw else {
                return Err(ValueError::ScalarArity {
                    value_type,
                    count: raw.len(),
                });
            };
            match value_type {
                AttributeValueType::Text => Ok(Self::Text(single.clone())),
                AttributeValueType::MultilineText => Ok(Self::MultilineText(single.clone())),
                AttributeValueType::Integer => Ok(Self::Integer(parse_integer(single)?)),
                AttributeValueType::Json => Ok(Self::Json(parse_json(single)?)),
            }
        }
    }
}

fn parse_integer(raw: &str) -> Result<i64, ValueError> {
    raw.trim().parse::<i64>().map_err(|_| ValueError::InvalidInteger {
        raw: raw.to_string(),
    })
}

fn parse_json(raw: &str) -> Result<serde_json::Value, ValueError> {
    serde_json::from_str(raw).map_err(|e| ValueError::InvalidJson {
        reason: e.to_string(),
    })
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::MultilineText(s) => write!(f, "{s}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Json(j) => write!(f, "{j}"),
            Self::TextArray(_)
            | Self::MultilineTextArray(_)
            | Self::IntegerArray(_)
            | Self::JsonArray(_) => write!(f, "{}", self.to_raw_strings().join(",")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(j: serde_json::Value) -> Self {
        Self::Json(j)
    }
}
