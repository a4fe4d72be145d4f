//! Configuration values
//!
//! Raw documents load into [`Value`] trees. Validation rewrites them into
//! normalized trees, where durations, quantities, lambdas and IDs have their
//! own variants. Both serialize back to JSON or YAML.

use indexmap::IndexMap;
use std::fmt;
use std::time::Duration;

use super::path::ConfigPath;
use crate::registry::TypeTag;

/// How an ID entered the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    /// Written by the user to name a new object
    Declare,
    /// Produced by the schema because the user gave none
    Generated,
    /// Written by the user to refer to an object declared elsewhere
    Use,
}

/// A configuration-level identifier with its expected target type
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigId {
    pub name: String,
    pub ty: TypeTag,
    pub kind: IdKind,
}

impl ConfigId {
    pub fn declare(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: IdKind::Declare,
        }
    }

    pub fn generated(ty: TypeTag) -> Self {
        Self {
            name: ty.id_hint(),
            ty,
            kind: IdKind::Generated,
        }
    }

    pub fn reference(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: IdKind::Use,
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self.kind, IdKind::Declare | IdKind::Generated)
    }
}

/// A configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Embedded target-language source, from a `!lambda` tag
    Lambda(String),
    /// Normalized ID (declaration, generated, or reference)
    Id(ConfigId),
    /// Normalized time period
    Duration(Duration),
    /// Normalized number with a physical unit, in the base unit
    Quantity { value: f64, unit: String },
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Lambda(_) => "lambda",
            Value::Id(_) => "id",
            Value::Duration(_) => "duration",
            Value::Quantity { .. } => "quantity",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value of ints and floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&str> {
        match self {
            Value::Lambda(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_id(&self) -> Option<&ConfigId> {
        match self {
            Value::Id(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Text of a scalar, as a string validator would coerce it
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Convert to serde_json::Value
    pub fn to_serde_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::Number(serde_json::Number::from(*n)),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) | Value::Lambda(s) => serde_json::Value::String(s.clone()),
            Value::Id(id) => serde_json::Value::String(id.name.clone()),
            Value::Duration(_) | Value::Quantity { .. } => {
                serde_json::Value::String(self.to_string())
            }
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_serde_json()).collect())
            }
            Value::Map(map) => {
                let map: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_serde_json()))
                    .collect();
                serde_json::Value::Object(map)
            }
        }
    }

    /// Convert to serde_yaml::Value; lambdas keep their `!lambda` tag
    pub fn to_serde_yaml(&self) -> serde_yaml::Value {
        use serde_yaml::value::{Tag, TaggedValue};

        match self {
            Value::Null => serde_yaml::Value::Null,
            Value::Bool(b) => serde_yaml::Value::Bool(*b),
            Value::Int(n) => serde_yaml::Value::Number((*n).into()),
            Value::Float(n) => serde_yaml::Value::Number((*n).into()),
            Value::String(s) => serde_yaml::Value::String(s.clone()),
            Value::Lambda(s) => serde_yaml::Value::Tagged(Box::new(TaggedValue {
                tag: Tag::new("lambda"),
                value: serde_yaml::Value::String(s.clone()),
            })),
            Value::Id(id) => serde_yaml::Value::String(id.name.clone()),
            Value::Duration(_) | Value::Quantity { .. } => {
                serde_yaml::Value::String(self.to_string())
            }
            Value::List(items) => {
                serde_yaml::Value::Sequence(items.iter().map(|v| v.to_serde_yaml()).collect())
            }
            Value::Map(map) => {
                let mut mapping = serde_yaml::Mapping::new();
                for (k, v) in map {
                    mapping.insert(serde_yaml::Value::String(k.clone()), v.to_serde_yaml());
                }
                serde_yaml::Value::Mapping(mapping)
            }
        }
    }
}

/// Render a duration with the largest unit that represents it exactly
pub fn format_duration(duration: Duration) -> String {
    let micros = duration.as_micros();
    if micros == 0 {
        return "0ms".to_string();
    }
    if micros % 1000 != 0 {
        return format!("{}us", micros);
    }
    let millis = micros / 1000;
    if millis % 1000 != 0 {
        return format!("{}ms", millis);
    }
    let secs = millis / 1000;
    if secs % 60 != 0 {
        format!("{}s", secs)
    } else if secs % 3600 != 0 {
        format!("{}min", secs / 60)
    } else {
        format!("{}h", secs / 3600)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{}.0", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Lambda(s) => write!(f, "!lambda {:?}", s),
            Value::Id(id) => write!(f, "{}", id.name),
            Value::Duration(d) => write!(f, "{}", format_duration(*d)),
            Value::Quantity { value, unit } => write!(f, "{}{}", value, unit),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

/// A value together with its location in the document
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNode {
    pub path: ConfigPath,
    pub value: Value,
}

impl ConfigNode {
    pub fn new(path: ConfigPath, value: impl Into<Value>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }

    /// A node at the document root
    pub fn root(value: impl Into<Value>) -> Self {
        Self::new(ConfigPath::root(), value)
    }

    /// The child under `key` of a mapping node
    pub fn get(&self, key: &str) -> Option<ConfigNode> {
        self.value
            .as_map()
            .and_then(|map| map.get(key))
            .map(|value| ConfigNode::new(self.path.key(key), value.clone()))
    }

    /// Whether a mapping node has `key`
    pub fn contains(&self, key: &str) -> bool {
        self.value
            .as_map()
            .map(|map| map.contains_key(key))
            .unwrap_or(false)
    }

    /// Children of a list node, each with its indexed path
    pub fn items(&self) -> Vec<ConfigNode> {
        match &self.value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| ConfigNode::new(self.path.index(i), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Children of a mapping node, in document order
    pub fn entries(&self) -> Vec<(String, ConfigNode)> {
        match &self.value {
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), ConfigNode::new(self.path.key(k), v.clone())))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|n| n.value.as_str().map(String::from))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|n| n.value.as_bool())
    }

    pub fn get_id(&self, key: &str) -> Option<ConfigId> {
        self.get(key).and_then(|n| n.value.as_id().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigNode {
        let mut inner = IndexMap::new();
        inner.insert("name".to_string(), Value::from("relay"));
        inner.insert("inverted".to_string(), Value::Bool(true));
        let mut root = IndexMap::new();
        root.insert(
            "switch".to_string(),
            Value::List(vec![Value::Map(inner)]),
        );
        ConfigNode::root(root)
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::Lambda("x".into()).type_name(), "lambda");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(Value::Map(IndexMap::new()).type_name(), "mapping");
    }

    #[test]
    fn test_navigation_keeps_paths() {
        let root = sample();
        let switches = root.get("switch").unwrap();
        let first = &switches.items()[0];
        assert_eq!(first.path.to_string(), "switch[0]");
        let name = first.get("name").unwrap();
        assert_eq!(name.path.to_string(), "switch[0].name");
        assert_eq!(name.value.as_str(), Some("relay"));
        assert_eq!(first.get_bool("inverted"), Some(true));
        assert!(first.get("icon").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2min");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_micros(250)), "250us");
    }

    #[test]
    fn test_to_serde_json() {
        let json = sample().value.to_serde_json();
        assert_eq!(json["switch"][0]["name"], "relay");
        assert_eq!(json["switch"][0]["inverted"], true);
    }

    #[test]
    fn test_lambda_keeps_tag_in_yaml() {
        let yaml = serde_yaml::to_string(&Value::Lambda("return true;".into()).to_serde_yaml())
            .unwrap();
        assert!(yaml.contains("!lambda"));
    }
}
