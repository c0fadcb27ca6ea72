//! Tagged argument schemas checked before a tool body runs
//!
//! The same declaration produces the JSON Schema advertised to the model and
//! the validator applied to the arguments it sends back.

use crate::calendar::parse_instant;
use serde_json::{json, Map, Value};

/// Type and constraint of one argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// ISO 8601 datetime, with or without an offset
    DateTime,
    /// Array of email addresses
    EmailList,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        let name = self.name;
        match self.kind {
            FieldKind::Text => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("'{name}' must be a string"))?;
                if self.required && text.trim().is_empty() {
                    return Err(format!("'{name}' must not be empty"));
                }
            }
            FieldKind::DateTime => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("'{name}' must be a datetime string"))?;
                // Shape only; the timezone is applied by the calendar adapter
                parse_instant(text, chrono_tz::Tz::UTC).map_err(|e| format!("'{name}': {e}"))?;
            }
            FieldKind::EmailList => {
                let items = value
                    .as_array()
                    .ok_or_else(|| format!("'{name}' must be an array of email addresses"))?;
                for item in items {
                    match item.as_str() {
                        Some(email) if email.contains('@') => {}
                        Some(email) => {
                            return Err(format!("'{name}' contains '{email}', which is not an email address"));
                        }
                        None => return Err(format!("'{name}' must contain only strings")),
                    }
                }
            }
            FieldKind::Enum(allowed) => {
                let text = value.as_str().unwrap_or_default();
                if !allowed.contains(&text) {
                    return Err(format!(
                        "'{name}' must be one of: {}",
                        allowed.join(", ")
                    ));
                }
            }
        }
        Ok(())
    }

    fn json_schema(&self) -> Value {
        let mut schema = match self.kind {
            FieldKind::Text => json!({ "type": "string" }),
            FieldKind::DateTime => json!({ "type": "string", "format": "date-time" }),
            FieldKind::EmailList => json!({
                "type": "array",
                "items": { "type": "string", "format": "email" }
            }),
            FieldKind::Enum(allowed) => json!({ "type": "string", "enum": allowed }),
        };
        schema["description"] = Value::String(self.description.to_string());
        schema
    }
}

/// Declared input of a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSchema {
    fields: Vec<FieldSpec>,
}

impl ArgSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Check `args` against the declared fields, collecting every problem
    ///
    /// Unknown fields are rejected. An explicit `null` counts as absent.
    pub fn validate(&self, args: &Value) -> Result<(), String> {
        let empty = Map::new();
        let object = match args {
            Value::Object(map) => map,
            Value::Null => &empty,
            Value::String(raw) => {
                return Err(format!("arguments are not a JSON object: {raw}"));
            }
            other => return Err(format!("arguments must be a JSON object, got {other}")),
        };

        let mut problems = Vec::new();
        for key in object.keys() {
            if !self.fields.iter().any(|f| f.name == key) {
                problems.push(format!("unknown field '{key}'"));
            }
        }
        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        problems.push(format!("missing required field '{}'", field.name));
                    }
                }
                Some(value) => {
                    if let Err(problem) = field.check(value) {
                        problems.push(problem);
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}
