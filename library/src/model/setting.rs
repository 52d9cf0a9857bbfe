use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::model::pixel::Color;

/// Node settings keyed by setting id.
pub type Settings = BTreeMap<String, SettingValue>;

/// A typed generator setting value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SettingValue {
    Int(i64),
    Double(OrderedFloat<f64>),
    Bool(bool),
    String(String),
    Color(Color),
}

impl SettingValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Int(_) => "int",
            SettingValue::Double(_) => "double",
            SettingValue::Bool(_) => "bool",
            SettingValue::String(_) => "string",
            SettingValue::Color(_) => "color",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(v) => Some(*v),
            SettingValue::Double(v) => Some(v.0.round() as i64),
            _ => None,
        }
    }

    /// Ints widen to doubles.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            SettingValue::Double(v) => Some(v.0),
            SettingValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            SettingValue::Color(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Double(OrderedFloat(value))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<Color> for SettingValue {
    fn from(value: Color) -> Self {
        SettingValue::Color(value)
    }
}

/// Schema entry describing one configurable setting of a generator.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SettingDefinition {
    /// Key used in node settings.
    pub key: String,
    /// Display name.
    pub name: String,
    pub description: String,
    pub default_value: SettingValue,
    pub min: Option<SettingValue>,
    pub max: Option<SettingValue>,
    /// Settings sharing a group are shown together.
    pub group: Option<String>,
    /// Key of a bool setting that must be on for this one to apply.
    pub enabler: Option<String>,
    /// Display order within the generator.
    pub order: i32,
}

impl SettingDefinition {
    pub fn new(key: &str, name: &str, default_value: impl Into<SettingValue>) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: String::new(),
            default_value: default_value.into(),
            min: None,
            max: None,
            group: None,
            enabler: None,
            order: 0,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_range(mut self, min: impl Into<SettingValue>, max: impl Into<SettingValue>) -> Self {
        self.min = Some(min.into());
        self.max = Some(max.into());
        self
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn with_enabler(mut self, enabler: &str) -> Self {
        self.enabler = Some(enabler.to_string());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Clamps numeric values into `[min, max]`; other types pass through.
    pub fn clamp(&self, value: &SettingValue) -> SettingValue {
        let bound = |b: &Option<SettingValue>| b.as_ref().and_then(SettingValue::as_double);
        match value {
            SettingValue::Int(v) => {
                let mut v = *v;
                if let Some(min) = bound(&self.min) {
                    v = v.max(min.ceil() as i64);
                }
                if let Some(max) = bound(&self.max) {
                    v = v.min(max.floor() as i64);
                }
                SettingValue::Int(v)
            }
            SettingValue::Double(v) => {
                let mut v = v.0;
                if let Some(min) = bound(&self.min) {
                    v = v.max(min);
                }
                if let Some(max) = bound(&self.max) {
                    v = v.min(max);
                }
                SettingValue::from(v)
            }
            other => other.clone(),
        }
    }
}
