//! Attribute templates and value constraints.
//!
//! A template names an attribute and states what a conforming value
//! looks like: kind, array-ness and value constraints. Constraint
//! checking is pure and returns all violations as data; a value failing
//! a constraint is never an error condition.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attribute::MergedCiAttribute;
use crate::error::TraitDefinitionError;
use crate::merge::MergedCi;
use crate::value::{AttributeValue, AttributeValueType};

/// Engine options for a regex constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegexOptions {
    /// Case-insensitive matching.
    #[serde(default)]
    pub case_insensitive: bool,
    /// `^` and `$` match line boundaries.
    #[serde(default)]
    pub multi_line: bool,
}

#[derive(Serialize, Deserialize)]
struct RegexSpec {
    pattern: String,
    #[serde(default)]
    options: RegexOptions,
}

/// A regex constraint: pattern, engine options and the compiled engine.
///
/// Compiled once at construction so repeated checks never recompile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RegexSpec", into = "RegexSpec")]
pub struct ConstraintRegex {
    pattern: String,
    options: RegexOptions,
    regex: Regex,
}

impl ConstraintRegex {
    /// Compiles a regex constraint.
    ///
    /// # Errors
    ///
    /// Returns [`TraitDefinitionError::InvalidRegex`] if the pattern does
    /// not compile.
    pub fn new(
        pattern: impl Into<String>,
        options: RegexOptions,
    ) -> Result<Self, TraitDefinitionError> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(options.case_insensitive)
            .multi_line(options.multi_line)
            .build()
            .map_err(|e| TraitDefinitionError::InvalidRegex {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            pattern,
            options,
            regex,
        })
    }

    /// The original pattern string.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The engine options.
    #[must_use]
    pub const fn options(&self) -> RegexOptions {
        self.options
    }

    /// Whether the pattern matches anywhere in `text`.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for ConstraintRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.options == other.options
    }
}

impl TryFrom<RegexSpec> for ConstraintRegex {
    type Error = TraitDefinitionError;

    fn try_from(spec: RegexSpec) -> Result<Self, Self::Error> {
        Self::new(spec.pattern, spec.options)
    }
}

impl From<ConstraintRegex> for RegexSpec {
    fn from(c: ConstraintRegex) -> Self {
        Self {
            pattern: c.pattern,
            options: c.options,
        }
    }
}

/// A single value constraint attached to an attribute template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributeValueConstraint {
    /// Inclusive bounds on text length, applied per text item.
    TextLength {
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<usize>,
    },

    /// Pattern match, applied per text item.
    TextRegex(ConstraintRegex),

    /// Inclusive bounds on the number of array elements.
    ArrayLength {
        #[serde(skip_serializing_if = "Option::is_none")]
        minimum: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        maximum: Option<usize>,
    },
}

impl AttributeValueConstraint {
    /// Builds a text length constraint, validating the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TraitDefinitionError::InvalidConstraintBounds`] when
    /// `minimum > maximum`.
    pub fn text_length(
        minimum: Option<usize>,
        maximum: Option<usize>,
    ) -> Result<Self, TraitDefinitionError> {
        validate_bounds(minimum, maximum)?;
        Ok(Self::TextLength { minimum, maximum })
    }

    /// Builds a regex constraint.
    ///
    /// # Errors
    ///
    /// Returns [`TraitDefinitionError::InvalidRegex`] if the pattern does
    /// not compile.
    pub fn text_regex(
        pattern: impl Into<String>,
        options: RegexOptions,
    ) -> Result<Self, TraitDefinitionError> {
        Ok(Self::TextRegex(ConstraintRegex::new(pattern, options)?))
    }

    /// Builds an array length constraint, validating the bounds.
    ///
    /// # Errors
    ///
    /// Returns [`TraitDefinitionError::InvalidConstraintBounds`] when
    /// `minimum > maximum`.
    pub fn array_length(
        minimum: Option<usize>,
        maximum: Option<usize>,
    ) -> Result<Self, TraitDefinitionError> {
        validate_bounds(minimum, maximum)?;
        Ok(Self::ArrayLength { minimum, maximum })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::TextLength { .. } => "text_length",
            Self::TextRegex(_) => "text_regex",
            Self::ArrayLength { .. } => "array_length",
        }
    }
}

fn validate_bounds(
    minimum: Option<usize>,
    maximum: Option<usize>,
) -> Result<(), TraitDefinitionError> {
    if let (Some(min), Some(max)) = (minimum, maximum) {
        if min > max {
            return Err(TraitDefinitionError::InvalidConstraintBounds {
                minimum: min,
                maximum: max,
            });
        }
    }
    Ok(())
}

/// One violated constraint; plain data, never thrown.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintError {
    #[error("text of length {actual} is shorter than minimum {minimum}")]
    TextTooShort {
        actual: usize,
        minimum: usize,
    },

    #[error("text of length {actual} is longer than maximum {maximum}")]
    TextTooLong {
        actual: usize,
        maximum: usize,
    },

    #[error("text does not match pattern \"{pattern}\"")]
    RegexMismatch {
        pattern: String,
    },

    #[error("array of length {actual} is shorter than minimum {minimum}")]
    ArrayTooShort {
        actual: usize,
        minimum: usize,
    },

    #[error("array of length {actual} is longer than maximum {maximum}")]
    ArrayTooLong {
        actual: usize,
        maximum: usize,
    },

    /// The constraint kind does not apply to the value's runtime kind,
    /// e.g. a text length constraint on an integer.
    #[error("{constraint} constraint does not apply to a value of type {value_type}")]
    WrongType {
        constraint: String,
        value_type: AttributeValueType,
        value_is_array: bool,
    },
}

/// Evaluates a value against a set of constraints, returning every
/// violation instead of stopping at the first.
///
/// A constraint kind that cannot apply to the value's runtime kind
/// contributes a [`ConstraintError::WrongType`].
///
/// # Examples
///
/// ```
/// use stratum::{calculate_errors, AttributeValue, AttributeValueConstraint, RegexOptions};
///
/// let constraints = vec![
///     AttributeValueConstraint::text_length(None, Some(3)).unwrap(),
///     AttributeValueConstraint::text_regex("^[a-z]+$", RegexOptions::default()).unwrap(),
/// ];
/// let errors = calculate_errors(&AttributeValue::Text("Hello!".into()), &constraints);
/// assert_eq!(errors.len(), 2); // too long and failing the pattern
/// ```
#[must_use]
pub fn calculate_errors(
    value: &AttributeValue,
    constraints: &[AttributeValueConstraint],
) -> Vec<ConstraintError> {
    let mut errors = Vec::new();
    for constraint in constraints {
        match constraint {
            AttributeValueConstraint::TextLength { minimum, maximum } => {
                match value.text_items() {
                    Some(items) => {
                        for item in items {
                            let len = item.chars().count();
                            if let Some(min) = minimum {
                                if len < *min {
                                    errors.push(ConstraintError::TextTooShort {
                                        actual: len,
                                        minimum: *min,
                                    });
                                }
                            }
                            if let Some(max) = maximum {
                                if len > *max {
                                    errors.push(ConstraintError::TextTooLong {
                                        actual: len,
                                        maximum: *max,
                                    });
                                }
                            }
                        }
                    }
                    None => errors.push(wrong_type(constraint, value)),
                }
            }
            AttributeValueConstraint::TextRegex(regex) => match value.text_items() {
                Some(items) => {
                    for item in items {
                        if !regex.is_match(item) {
                            errors.push(ConstraintError::RegexMismatch {
                                pattern: regex.pattern().to_string(),
                            });
                        }
                    }
                }
                None => errors.push(wrong_type(constraint, value)),
            },
            AttributeValueConstraint::ArrayLength { minimum, maximum } => {
                match value.array_len() {
                    Some(len) => {
                        if let Some(min) = minimum {
                            if len < *min {
                                errors.push(ConstraintError::ArrayTooShort {
                                    actual: len,
                                    minimum: *min,
                                });
                            }
                        }
                        if let Some(max) = maximum {
                            if len > *max {
                                errors.push(ConstraintError::ArrayTooLong {
                                    actual: len,
                                    maximum: *max,
                                });
                            }
                        }
                    }
                    None => errors.push(wrong_type(constraint, value)),
                }
            }
        }
    }
    errors
}

fn wrong_type(constraint: &AttributeValueConstraint, value: &AttributeValue) -> ConstraintError {
    ConstraintError::WrongType {
        constraint: constraint.kind().to_string(),
        value_type: value.value_type(),
        value_is_array: value.is_array(),
    }
}

/// Schema for one attribute: expected kind, array-ness and constraints.
///
/// `value_type` and `is_array` are optional; an unset expectation accepts
/// any value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiAttributeTemplate {
    /// Name of the merged attribute this template targets.
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<AttributeValueType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_array: Option<bool>,

    #[serde(default)]
    pub constraints: Vec<AttributeValueConstraint>,
}

impl CiAttributeTemplate {
    /// Creates a template accepting any value under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: None,
            is_array: None,
            constraints: Vec::new(),
        }
    }

    /// Expects a specific value kind.
    #[must_use]
    pub fn with_type(mut self, value_type: AttributeValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    /// Expects scalar or array shape.
    #[must_use]
    pub fn with_array(mut self, is_array: bool) -> Self {
        self.is_array = Some(is_array);
        self
    }

    /// Attaches a value constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: AttributeValueConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// One reason a merged attribute fails its template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    /// The template's target name has no merged attribute.
    Missing {
        name: String,
        expected_type: Option<AttributeValueType>,
    },

    /// The merged value has the wrong kind.
    WrongType {
        expected: AttributeValueType,
        actual: AttributeValueType,
    },

    /// The merged value is array where scalar was expected, or vice
    /// versa.
    WrongMultiplicity {
        expected_array: bool,
    },

    /// A value constraint is violated.
    Constraint(ConstraintError),
}

impl std::error::Error for TemplateError {}

impl From<ConstraintError> for TemplateError {
    fn from(e: ConstraintError) -> Self {
        Self::Constraint(e)
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing {
                name,
                expected_type: Some(t),
            } => write!(f, "attribute \"{name}\" of type {t} is missing"),
            Self::Missing {
                name,
                expected_type: None,
            } => write!(f, "attribute \"{name}\" is missing"),
            Self::WrongType { expected, actual } => {
                write!(f, "attribute must be of type {expected}, is type {actual}")
            }
            Self::WrongMultiplicity {
                expected_array: true,
            } => write!(f, "attribute must be array, is scalar"),
            Self::WrongMultiplicity {
                expected_array: false,
            } => write!(f, "attribute must be scalar, is array"),
            Self::Constraint(e) => write!(f, "constraint violated: {e}"),
        }
    }
}

/// Checks one attribute template against a merged CI.
///
/// Returns the merged attribute (when present) together with every way it
/// falls short of the template. An empty error list means the template
/// is satisfied.
#[must_use]
pub fn check_attribute<'a>(
    ci: &'a MergedCi,
    template: &CiAttributeTemplate,
) -> (Option<&'a MergedCiAttribute>, Vec<TemplateError>) {
    let Some(found) = ci.attribute(&template.name) else {
        return (
            None,
            vec![TemplateError::Missing {
                name: template.name.clone(),
                expected_type: template.value_type,
            }],
        );
    };

    let mut errors = Vec::new();
    let value = &found.attribute.value;
    if let Some(expected) = template.value_type {
        if value.value_type() != expected {
            errors.push(TemplateError::WrongType {
                expected,
                actual: value.value_type(),
            });
        }
    }
    if let Some(expected_array) = template.is_array {
        if value.is_array() != expected_array {
            errors.push(TemplateError::WrongMultiplicity { expected_array });
        }
    }
    errors.extend(
        calculate_errors(value, &template.constraints)
            .into_iter()
            .map(TemplateError::Constraint),
    );
    (Some(found), errors)
}

impl fmt::Display for CiAttributeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(t) = self.value_type {
            write!(f, ": {t}")?;
        }
        if self.is_array == Some(true) {
            write!(f, "[]")?;
        }
        Ok(())
    }
}
