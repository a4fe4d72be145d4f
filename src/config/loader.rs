// YAML configuration loader
//
// Turns a YAML (or JSON) document into a raw `Value` tree. The only tag the
// loader understands is `!lambda`, which marks embedded target-language code.

use std::path::Path;

use indexmap::IndexMap;

use super::value::{ConfigNode, Value};
use crate::errors::{ConfgenError, ConfgenResult};

/// Load a configuration file into a root node
pub fn load_file(path: &Path) -> ConfgenResult<ConfigNode> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfgenError::io_error(format!("failed to read {}: {}", path.display(), e)))?;
    load_str(&content)
}

/// Load configuration source text into a root node
pub fn load_str(content: &str) -> ConfgenResult<ConfigNode> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)
        .map_err(|e| ConfgenError::parse(format!("YAML parse error: {}", e)))?;
    Ok(ConfigNode::root(from_yaml(yaml)?))
}

/// Convert a parsed YAML value
pub fn from_yaml(yaml: serde_yaml::Value) -> ConfgenResult<Value> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(ConfgenError::parse(format!("number out of range: {}", n)))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(items) => Ok(Value::List(
            items
                .into_iter()
                .map(from_yaml)
                .collect::<ConfgenResult<Vec<_>>>()?,
        )),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = IndexMap::new();
            for (key, value) in mapping {
                map.insert(key_text(&key)?, from_yaml(value)?);
            }
            Ok(Value::Map(map))
        }
        serde_yaml::Value::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            if tag.trim_start_matches('!') != "lambda" {
                return Err(ConfgenError::parse(format!(
                    "unsupported tag '{}'; only !lambda is allowed",
                    tag
                )));
            }
            match tagged.value {
                serde_yaml::Value::String(code) => Ok(Value::Lambda(code)),
                other => Err(ConfgenError::parse(format!(
                    "!lambda must be applied to a string, found {}",
                    yaml_kind(&other)
                ))),
            }
        }
    }
}

fn key_text(key: &serde_yaml::Value) -> ConfgenResult<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        other => Err(ConfgenError::parse(format!(
            "mapping keys must be scalars, found {}",
            yaml_kind(other)
        ))),
    }
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "boolean",
        serde_yaml::Value::Number(_) => "number",
        serde_yaml::Value::String(_) => "string",
        serde_yaml::Value::Sequence(_) => "sequence",
        serde_yaml::Value::Mapping(_) => "mapping",
        serde_yaml::Value::Tagged(_) => "tagged value",
    }
}
