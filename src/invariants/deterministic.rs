//! Deterministic checkers: substring, regex, latency, and JSON shape.

use async_trait::async_trait;
use regex::Regex;

use super::verifier::{CheckError, CheckOutcome};
use super::Checker;

/// Passes when the response contains a substring.
pub struct ContainsChecker {
    substring: String,
    case_sensitive: bool,
}

impl ContainsChecker {
    pub fn new(substring: String, case_sensitive: bool) -> Self {
        Self {
            substring,
            case_sensitive,
        }
    }
}

#[async_trait]
impl Checker for ContainsChecker {
    fn kind(&self) -> &'static str {
        "contains"
    }

    async fn check(&self, output: &str, _latency_ms: f64) -> Result<CheckOutcome, CheckError> {
        let found = if self.case_sensitive {
            output.contains(&self.substring)
        } else {
            output
                .to_lowercase()
                .contains(&self.substring.to_lowercase())
        };

        Ok(if found {
            CheckOutcome::passed(self.kind(), format!("found '{}'", self.substring))
        } else {
            CheckOutcome::failed(self.kind(), format!("'{}' not found", self.substring))
        })
    }
}

/// Passes when the response matches a regular expression.
pub struct RegexChecker {
    pattern: Regex,
    source: String,
}

impl RegexChecker {
    /// Compiles `pattern` with optional inline flag characters (`i`, `m`,
    /// `s`, `x`).
    pub fn new(pattern: &str, flags: &str) -> Result<Self, regex::Error> {
        let full = if flags.is_empty() {
            pattern.to_string()
        } else {
            format!("(?{flags}){pattern}")
        };
        Ok(Self {
            pattern: Regex::new(&full)?,
            source: pattern.to_string(),
        })
    }
}

#[async_trait]
impl Checker for RegexChecker {
    fn kind(&self) -> &'static str {
        "regex"
    }

    async fn check(&self, output: &str, _latency_ms: f64) -> Result<CheckOutcome, CheckError> {
        Ok(if self.pattern.is_match(output) {
            CheckOutcome::passed(self.kind(), format!("matched /{}/", self.source))
        } else {
            CheckOutcome::failed(self.kind(), format!("no match for /{}/", self.source))
        })
    }
}

/// Passes when latency stays under the configured bound.
pub struct LatencyChecker {
    max_ms: f64,
}

impl LatencyChecker {
    pub fn new(max_ms: f64) -> Self {
        Self { max_ms }
    }
}

#[async_trait]
impl Checker for LatencyChecker {
    fn kind(&self) -> &'static str {
        "latency"
    }

    async fn check(&self, _output: &str, latency_ms: f64) -> Result<CheckOutcome, CheckError> {
        Ok(if latency_ms <= self.max_ms {
            CheckOutcome::passed(
                self.kind(),
                format!("latency {latency_ms:.0} <= {:.0} ms", self.max_ms),
            )
        } else {
            CheckOutcome::failed(
                self.kind(),
                format!("latency {latency_ms:.0} > {:.0} ms", self.max_ms),
            )
        })
    }
}

/// Passes when the response parses as JSON and, if a schema is given,
/// conforms to it.
///
/// The schema is a minimal structural subset: `type`, `required`,
/// `properties`, and `items`.
pub struct ValidJsonChecker {
    schema: Option<serde_json::Value>,
}

impl ValidJsonChecker {
    pub fn new(schema: Option<serde_json::Value>) -> Self {
        Self { schema }
    }

    fn conforms(
        value: &serde_json::Value,
        schema: &serde_json::Value,
        path: &str,
    ) -> Result<(), String> {
        if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
            let actual = json_type_name(value);
            let matches = match expected {
                "integer" => value.as_i64().is_some() || value.as_u64().is_some(),
                "number" => value.is_number(),
                other => actual == other,
            };
            if !matches {
                return Err(format!("{path}: expected {expected}, got {actual}"));
            }
        }

        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for key in required.iter().filter_map(|k| k.as_str()) {
                if value.get(key).is_none() {
                    return Err(format!("{path}: missing required key '{key}'"));
                }
            }
        }

        if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, sub_schema) in properties {
                if let Some(sub_value) = value.get(key) {
                    Self::conforms(sub_value, sub_schema, &format!("{path}.{key}"))?;
                }
            }
        }

        if let Some(items) = schema.get("items") {
            if let Some(array) = value.as_array() {
                for (idx, item) in array.iter().enumerate() {
                    Self::conforms(item, items, &format!("{path}[{idx}]"))?;
                }
            }
        }

        Ok(())
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[async_trait]
impl Checker for ValidJsonChecker {
    fn kind(&self) -> &'static str {
        "valid_json"
    }

    async fn check(&self, output: &str, _latency_ms: f64) -> Result<CheckOutcome, CheckError> {
        let value: serde_json::Value = match serde_json::from_str(output.trim()) {
            Ok(v) => v,
            Err(e) => {
                return Ok(CheckOutcome::failed(
                    self.kind(),
                    format!("not valid JSON: {e}"),
                ));
            }
        };

        if let Some(schema) = &self.schema {
            if let Err(violation) = Self::conforms(&value, schema, "$") {
                return Ok(CheckOutcome::failed(
                    self.kind(),
                    format!("schema violation at {violation}"),
                ));
            }
        }

        Ok(CheckOutcome::passed(self.kind(), "valid JSON"))
    }
}
