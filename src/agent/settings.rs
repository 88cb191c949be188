//! Agent settings: schema declaration, rendering and immutable snapshots.
//!
//! A [`SettingsSchema`] is declared once per agent. Rendering it checks every
//! declared type against the closed set the host understands
//! (`string`, `number`, `boolean`, `object`) and produces the descriptors
//! shown in the host's settings UI.
//!
//! Values live in [`Settings`] snapshots. A reload from the persisted store
//! builds a new snapshot with a bumped version and swaps it in whole; a
//! snapshot already handed out is never modified.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{AppError, Result};

/// Setting types the host can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// Free text.
    String,
    /// Integer or float.
    Number,
    /// Toggle.
    Boolean,
    /// JSON object.
    Object,
}

impl SettingType {
    /// Parse a declared type name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            _ => None,
        }
    }

    /// Type name of a JSON default value. Arrays and `null` have names but
    /// no [`SettingType`], so they fail at render time.
    fn name_of(value: &Value) -> &'static str {
        match value {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
            Value::Null => "null",
        }
    }

    /// Decode a persisted text value into JSON of this type.
    fn parse(self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_owned())),
            Self::Number => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .ok()
                .or_else(|| raw.trim().parse::<f64>().ok().map(Value::from)),
            Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "on" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "off" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            Self::Object => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(Value::is_object),
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// One declared setting.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDecl {
    /// Setting key.
    pub key: String,
    /// Default value.
    pub default: Value,
    /// Human-readable description.
    pub description: String,
    /// Declared type name, validated at render time.
    pub declared_type: String,
}

/// Rendered setting, in the shape the host's settings UI consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingDescriptor {
    /// Setting key.
    pub key: String,
    /// Title derived from the key (`max_results` → `Max Results`).
    pub title: String,
    /// Validated type.
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    /// Default value.
    pub default: Value,
    /// Human-readable description.
    pub description: String,
}

/// Ordered settings declaration of one agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSchema {
    decls: Vec<SettingDecl>,
}

impl SettingsSchema {
    /// Empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a setting whose type follows its default value.
    #[must_use]
    pub fn setting(self, key: &str, default: impl Into<Value>, description: &str) -> Self {
        let default = default.into();
        let declared = SettingType::name_of(&default).to_owned();
        self.typed(key, &declared, default, description)
    }

    /// Declare a setting with an explicit type name.
    #[must_use]
    pub fn typed(
        mut self,
        key: &str,
        declared_type: &str,
        default: impl Into<Value>,
        description: &str,
    ) -> Self {
        let decl = SettingDecl {
            key: key.to_owned(),
            default: default.into(),
            description: description.to_owned(),
            declared_type: declared_type.to_owned(),
        };
        match self.decls.iter_mut().find(|d| d.key == decl.key) {
            Some(existing) => *existing = decl,
            None => self.decls.push(decl),
        }
        self
    }

    /// Declared settings in order.
    #[must_use]
    pub fn decls(&self) -> &[SettingDecl] {
        &self.decls
    }

    /// Whether no setting is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// Validate types and produce the host-facing descriptors.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Schema` naming the first setting whose declared
    /// type is not `string`, `number`, `boolean` or `object`.
    pub fn render(&self) -> Result<Vec<SettingDescriptor>> {
        self.decls
            .iter()
            .map(|decl| {
                let setting_type = SettingType::from_name(&decl.declared_type).ok_or_else(|| {
                    AppError::Schema(format!(
                        "expected type for setting {} to be one of string, number, boolean, object, got: {}",
                        decl.key, decl.declared_type
                    ))
                })?;
                Ok(SettingDescriptor {
                    key: decl.key.clone(),
                    title: title_case(&decl.key),
                    setting_type,
                    default: decl.default.clone(),
                    description: decl.description.clone(),
                })
            })
            .collect()
    }

    /// First snapshot: every setting at its default.
    #[must_use]
    pub fn defaults(&self) -> Settings {
        Settings {
            version: 0,
            values: self
                .decls
                .iter()
                .map(|d| (d.key.clone(), d.default.clone()))
                .collect(),
        }
    }
}

/// Immutable, versioned settings values of one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Settings {
    version: u64,
    values: BTreeMap<String, Value>,
}

impl Settings {
    /// Snapshot version; bumped on every reload.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Raw value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Integer value of `key`.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Boolean value of `key`.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// String value of `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// All values by key.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Build the next snapshot: schema defaults overlaid with `persisted`
    /// text values. Keys not declared in `schema` are ignored; values that
    /// do not parse as the declared type keep the default.
    #[must_use]
    pub fn reloaded(&self, schema: &SettingsSchema, persisted: &HashMap<String, String>) -> Self {
        let mut next = schema.defaults();
        next.version = self.version + 1;

        for decl in schema.decls() {
            let Some(raw) = persisted.get(&decl.key) else {
                continue;
            };
            let parsed = SettingType::from_name(&decl.declared_type).and_then(|t| t.parse(raw));
            match parsed {
                Some(value) => {
                    next.values.insert(decl.key.clone(), value);
                }
                None => {
                    warn!(
                        key = %decl.key,
                        declared_type = %decl.declared_type,
                        raw = %raw,
                        "persisted setting does not match declared type, keeping default"
                    );
                }
            }
        }

        next
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
