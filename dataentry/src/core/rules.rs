//! Field rule model: how tabular columns map onto form fields.
//!
//! The mapping document is first deserialized into `Raw*` shapes, then
//! [`Mapping::from_raw`] normalizes defaults and rejects malformed rules. That
//! constructor is the single validation point; everything downstream works
//! with the validated, immutable types.

use std::fmt;

use regex::Regex;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

/// Bad mapping shape or run parameters. Always fatal, before any row runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mapping url must not be empty")]
    EmptyUrl,

    #[error("unsupported browser '{0}' (expected chrome, chromium, or firefox)")]
    UnsupportedBrowser(String),

    #[error("field '{column}': unsupported field type '{kind}' (expected text, select, or checkbox)")]
    UnsupportedKind { column: String, kind: String },

    #[error("field '{column}': selector must not be empty")]
    EmptySelector { column: String },

    #[error("field '{column}': regex validator requires 'pattern'")]
    MissingPattern { column: String },

    #[error("field '{column}': invalid regex pattern")]
    InvalidPattern {
        column: String,
        #[source]
        source: regex::Error,
    },

    #[error("field '{column}': enum validator requires 'values'")]
    MissingValues { column: String },

    #[error("success_check.text_contains requires success_check.selector")]
    TextWithoutSelector,

    #[error("mapping has no submit_selector (configure one or use --dry-run)")]
    MissingSubmitSelector,

    #[error("invalid row range: {0}")]
    InvalidRange(String),

    #[error("invalid filter expression '{expr}': {reason}")]
    InvalidFilter { expr: String, reason: String },
}

/// Scalar as written in the mapping document (values and defaults may be
/// numbers or booleans in YAML/TOML; they are always compared as strings).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for RawScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawScalar::Bool(b) => write!(f, "{b}"),
            RawScalar::Int(i) => write!(f, "{i}"),
            RawScalar::Float(x) => write!(f, "{}", crate::core::types::Cell::Number(*x)),
            RawScalar::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawValidator {
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    pub pattern: Option<String>,
    pub values: Option<Vec<RawScalar>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFieldRule {
    pub selector: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    pub default: Option<RawScalar>,
    pub validators: Option<Vec<RawValidator>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSuccessCheck {
    pub selector: Option<String>,
    pub text_contains: Option<String>,
}

/// Mapping document as written on disk.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMapping {
    pub url: String,
    pub browser: Option<String>,
    #[serde(default)]
    pub headless: bool,
    pub submit_selector: Option<String>,
    pub success_check: Option<RawSuccessCheck>,
    #[serde(deserialize_with = "ordered_fields")]
    pub fields: Vec<(String, RawFieldRule)>,
}

/// Deserialize the `fields` map keeping declared order.
fn ordered_fields<'de, D>(deserializer: D) -> Result<Vec<(String, RawFieldRule)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct FieldsVisitor;

    impl<'de> Visitor<'de> for FieldsVisitor {
        type Value = Vec<(String, RawFieldRule)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of column name to field rule")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut fields: Vec<(String, RawFieldRule)> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((column, rule)) = map.next_entry::<String, RawFieldRule>()? {
                if fields.iter().any(|(existing, _)| *existing == column) {
                    return Err(de::Error::custom(format!("duplicate field '{column}'")));
                }
                fields.push((column, rule));
            }
            Ok(fields)
        }
    }

    deserializer.deserialize_map(FieldsVisitor)
}

/// How a form control is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Select,
    Checkbox,
}

impl FieldKind {
    /// Parse a kind tag. `input` is accepted as a synonym for `text`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" | "input" => Some(FieldKind::Text),
            "select" => Some(FieldKind::Select),
            "checkbox" => Some(FieldKind::Checkbox),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Select => "select",
            FieldKind::Checkbox => "checkbox",
        }
    }
}

/// One validator in a field's ordered chain.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Whole-value match against `pattern` (compiled anchored at both ends).
    Regex {
        pattern: Regex,
        message: Option<String>,
    },
    Enum {
        values: Vec<String>,
        message: Option<String>,
    },
    /// Unrecognized tag. Never fails.
    Unknown { kind: String },
}

impl Validator {
    fn from_raw(column: &str, raw: RawValidator) -> Result<Self, ConfigError> {
        match raw.kind.trim().to_ascii_lowercase().as_str() {
            "regex" => {
                let source = raw.pattern.ok_or_else(|| ConfigError::MissingPattern {
                    column: column.to_string(),
                })?;
                let pattern = Regex::new(&format!(r"\A(?:{source})\z")).map_err(|err| {
                    ConfigError::InvalidPattern {
                        column: column.to_string(),
                        source: err,
                    }
                })?;
                Ok(Validator::Regex {
                    pattern,
                    message: raw.message,
                })
            }
            "enum" => {
                let values = raw.values.ok_or_else(|| ConfigError::MissingValues {
                    column: column.to_string(),
                })?;
                Ok(Validator::Enum {
                    values: values.iter().map(ToString::to_string).collect(),
                    message: raw.message,
                })
            }
            _ => Ok(Validator::Unknown { kind: raw.kind }),
        }
    }
}

/// Validated rule binding one source column to one form control.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub column: String,
    pub selector: String,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<String>,
    pub validators: Vec<Validator>,
}

impl FieldRule {
    pub fn from_raw(column: &str, raw: RawFieldRule) -> Result<Self, ConfigError> {
        if raw.selector.trim().is_empty() {
            return Err(ConfigError::EmptySelector {
                column: column.to_string(),
            });
        }
        let kind = match raw.kind {
            None => FieldKind::Text,
            Some(tag) => FieldKind::parse(&tag).ok_or_else(|| ConfigError::UnsupportedKind {
                column: column.to_string(),
                kind: tag,
            })?,
        };
        let validators = raw
            .validators
            .unwrap_or_default()
            .into_iter()
            .map(|validator| Validator::from_raw(column, validator))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            column: column.to_string(),
            selector: raw.selector,
            kind,
            required: raw.required,
            default: raw.default.map(|value| value.to_string()),
            validators,
        })
    }

    /// A required rule without a default rejects empty input.
    pub fn rejects_empty(&self) -> bool {
        self.required && self.default.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Chrome,
    Firefox,
}

impl Browser {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "chrome" | "chromium" => Some(Browser::Chrome),
            "firefox" => Some(Browser::Firefox),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
        }
    }
}

/// Post-submit condition: `selector` becomes visible, then optionally its text
/// contains `text_contains`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessCheck {
    pub selector: String,
    pub text_contains: Option<String>,
}

/// Process-wide mapping, loaded once and never mutated.
#[derive(Debug, Clone)]
pub struct Mapping {
    pub url: String,
    pub browser: Browser,
    pub headless: bool,
    pub submit_selector: Option<String>,
    pub success_check: Option<SuccessCheck>,
    /// Declared order is the interaction order.
    pub fields: Vec<FieldRule>,
}

impl Mapping {
    pub fn from_raw(raw: RawMapping) -> Result<Self, ConfigError> {
        if raw.url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        let browser = match raw.browser {
            None => Browser::Chrome,
            Some(name) => Browser::parse(&name).ok_or(ConfigError::UnsupportedBrowser(name))?,
        };
        let success_check = match raw.success_check {
            None => None,
            Some(check) => normalize_success_check(check)?,
        };
        let submit_selector = raw
            .submit_selector
            .filter(|selector| !selector.trim().is_empty());
        let fields = raw
            .fields
            .into_iter()
            .map(|(column, rule)| FieldRule::from_raw(&column, rule))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            url: raw.url,
            browser,
            headless: raw.headless,
            submit_selector,
            success_check,
            fields,
        })
    }

    /// Submit selector, required whenever a run actually submits.
    pub fn require_submit_selector(&self) -> Result<&str, ConfigError> {
        self.submit_selector
            .as_deref()
            .ok_or(ConfigError::MissingSubmitSelector)
    }

    /// Rule validators with a tag this build does not understand.
    pub fn unknown_validators(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .flat_map(|rule| {
                rule.validators.iter().filter_map(|validator| match validator {
                    Validator::Unknown { kind } => Some((rule.column.as_str(), kind.as_str())),
                    _ => None,
                })
            })
            .collect()
    }
}

fn normalize_success_check(raw: RawSuccessCheck) -> Result<Option<SuccessCheck>, ConfigError> {
    let selector = raw.selector.filter(|selector| !selector.trim().is_empty());
    let text_contains = raw.text_contains.filter(|text| !text.is_empty());
    match (selector, text_contains) {
        (None, None) => Ok(None),
        (None, Some(_)) => Err(ConfigError::TextWithoutSelector),
        (Some(selector), text_contains) => Ok(Some(SuccessCheck {
            selector,
            text_contains,
        })),
    }
}
