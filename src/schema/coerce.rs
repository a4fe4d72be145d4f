//! Scalar coercions used by the built-in validators

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::config::{ConfigNode, Value};
use crate::errors::ValidationError;

type Coerced = Result<Value, ValidationError>;

fn fail(node: &ConfigNode, message: impl Into<String>) -> ValidationError {
    ValidationError::new(node.path.clone(), message)
}

static QUANTITY: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn quantity_pattern(node: &ConfigNode) -> Result<&'static Regex, ValidationError> {
    QUANTITY
        .get_or_init(|| {
            Regex::new(r"^([-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][-+]?[0-9]+)?)\s*([a-zA-Zµ%]*)$")
        })
        .as_ref()
        .map_err(|e| fail(node, format!("internal pattern error: {}", e)))
}

/// Booleans, plus the usual spellings of on and off
pub fn boolean(node: &ConfigNode) -> Coerced {
    match &node.value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "on" | "enable" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "disable" => Ok(Value::Bool(false)),
            _ => Err(fail(
                node,
                format!("expected boolean value, but cannot convert '{}' to a boolean", s),
            )
            .with_help("use 'true' or 'false'")),
        },
        other => Err(fail(
            node,
            format!("expected boolean value, got {}", other.type_name()),
        )),
    }
}

/// Integers, integral floats and numeric strings
pub fn int(node: &ConfigNode, min: Option<i64>, max: Option<i64>) -> Coerced {
    let n = match &node.value {
        Value::Int(n) => *n,
        Value::Float(f) if f.fract() == 0.0 && f.is_finite() => *f as i64,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| fail(node, format!("expected integer, but got '{}'", s)))?,
        other => {
            return Err(fail(node, format!("expected integer, got {}", other.type_name())))
        }
    };
    if let Some(min) = min {
        if n < min {
            return Err(fail(node, format!("value must be at least {}", min)));
        }
    }
    if let Some(max) = max {
        if n > max {
            return Err(fail(node, format!("value must be at most {}", max)));
        }
    }
    Ok(Value::Int(n))
}

/// Floats, integers and numeric strings
pub fn float(node: &ConfigNode, min: Option<f64>, max: Option<f64>) -> Coerced {
    let f = match &node.value {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| fail(node, format!("expected float, but got '{}'", s)))?,
        other => return Err(fail(node, format!("expected float, got {}", other.type_name()))),
    };
    if let Some(min) = min {
        if f < min {
            return Err(fail(node, format!("value must be at least {}", min)));
        }
    }
    if let Some(max) = max {
        if f > max {
            return Err(fail(node, format!("value must be at most {}", max)));
        }
    }
    Ok(Value::Float(f))
}

/// Any scalar, as text
pub fn string(node: &ConfigNode) -> Coerced {
    match &node.value {
        Value::List(_) | Value::Map(_) => Err(fail(
            node,
            "string value cannot be a mapping or a list",
        )),
        Value::Null => Err(fail(node, "string value is missing")),
        Value::Lambda(_) => Err(fail(node, "a lambda is not allowed here")),
        other => other
            .scalar_text()
            .map(Value::String)
            .ok_or_else(|| fail(node, format!("expected string, got {}", other.type_name()))),
    }
}

/// Only values that were strings in the document
pub fn string_strict(node: &ConfigNode) -> Coerced {
    match &node.value {
        Value::String(s) => Ok(Value::String(s.clone())),
        other => Err(fail(node, format!("must be string, got {}", other.type_name()))
            .with_help("did you forget putting quotes around the value?")),
    }
}

/// Lowercase letters, digits and underscores
pub fn valid_name(node: &ConfigNode) -> Coerced {
    let text = match string(node)? {
        Value::String(s) => s,
        other => return Ok(other),
    };
    if text.is_empty() {
        return Err(fail(node, "name must not be empty"));
    }
    if let Some(bad) = text
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
    {
        return Err(fail(
            node,
            format!("'{}' is an invalid character for names", bad),
        )
        .with_help("valid characters are lowercase letters, digits and underscores"));
    }
    Ok(Value::String(text))
}

/// Material design icon references, `mdi:<name>`
pub fn icon(node: &ConfigNode) -> Coerced {
    let text = match string(node)? {
        Value::String(s) => s,
        other => return Ok(other),
    };
    if text.starts_with("mdi:") {
        Ok(Value::String(text))
    } else {
        Err(fail(node, "icons should start with prefix 'mdi:'"))
    }
}

/// Case-insensitive match against `choices`; yields the canonical spelling
pub fn one_of(node: &ConfigNode, choices: &[String]) -> Coerced {
    let text = node
        .value
        .scalar_text()
        .ok_or_else(|| fail(node, format!("expected one of {}", choices.join(", "))))?;
    choices
        .iter()
        .find(|c| c.eq_ignore_ascii_case(text.trim()))
        .map(|c| Value::String(c.clone()))
        .ok_or_else(|| {
            let quoted: Vec<String> = choices.iter().map(|c| format!("'{}'", c)).collect();
            let err = fail(
                node,
                format!("unknown value '{}', valid options are {}", text, quoted.join(", ")),
            );
            match crate::errors::find_similar(&text, choices, 2) {
                Some(suggestion) => err.with_help(format!("did you mean '{}'?", suggestion)),
                None => err,
            }
        })
}

fn unit_micros(unit: &str) -> Option<f64> {
    match unit {
        "us" | "µs" => Some(1.0),
        "ms" => Some(1_000.0),
        "s" | "sec" => Some(1_000_000.0),
        "min" => Some(60_000_000.0),
        "h" => Some(3_600_000_000.0),
        "d" => Some(86_400_000_000.0),
        _ => None,
    }
}

/// Time periods: `500ms`, `1.5s`, `2min`, `1h`, or `HH:MM[:SS]`.
///
/// Bare numbers are rejected; the unit is mandatory.
pub fn duration(node: &ConfigNode) -> Coerced {
    match &node.value {
        Value::Duration(d) => Ok(Value::Duration(*d)),
        Value::Int(_) | Value::Float(_) => Err(fail(
            node,
            format!("don't know what '{}' means as it has no time unit", node.value),
        )
        .with_help(format!("did you mean '{}s'?", node.value))),
        Value::String(s) => parse_duration(s).map(Value::Duration).ok_or_else(|| {
            fail(node, format!("invalid time period '{}'", s))
                .with_help("use a number with a unit (us, ms, s, min, h, d) or HH:MM:SS")
        }),
        other => Err(fail(
            node,
            format!("expected a time period, got {}", other.type_name()),
        )),
    }
}

fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.contains(':') {
        let parts: Vec<&str> = text.split(':').collect();
        let numbers = parts
            .iter()
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        let secs = match numbers.as_slice() {
            [h, m] => h * 3600 + m * 60,
            [h, m, s] => h * 3600 + m * 60 + s,
            _ => return None,
        };
        return Some(Duration::from_secs(secs));
    }

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number: f64 = number.parse().ok()?;
    let factor = unit_micros(unit.trim())?;
    let micros = number * factor;
    if !micros.is_finite() || micros < 0.0 {
        return None;
    }
    Some(Duration::from_micros(micros.round() as u64))
}

fn si_prefix(prefix: &str) -> Option<f64> {
    match prefix {
        "" => Some(1.0),
        "p" => Some(1e-12),
        "n" => Some(1e-9),
        "u" | "µ" => Some(1e-6),
        "m" => Some(1e-3),
        "k" => Some(1e3),
        "M" => Some(1e6),
        "G" => Some(1e9),
        _ => None,
    }
}

/// Numbers with an optional SI prefix and `unit`, normalized to the base unit
pub fn quantity(node: &ConfigNode, unit: &str) -> Coerced {
    let value = match &node.value {
        Value::Quantity { value, unit: u } if u == unit => *value,
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        Value::String(s) => {
            let pattern = quantity_pattern(node)?;
            let caps = pattern.captures(s.trim()).ok_or_else(|| {
                fail(node, format!("expected a {} value, got '{}'", unit, s))
            })?;
            let number: f64 = caps
                .get(1)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(|| fail(node, format!("invalid number in '{}'", s)))?;
            let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let prefix = if suffix.is_empty() {
                ""
            } else {
                suffix.strip_suffix(unit).ok_or_else(|| {
                    fail(node, format!("unit of '{}' must be {}", s, unit))
                })?
            };
            let scale = si_prefix(prefix).ok_or_else(|| {
                fail(node, format!("unknown unit prefix '{}' in '{}'", prefix, s))
            })?;
            number * scale
        }
        other => {
            return Err(fail(
                node,
                format!("expected a {} value, got {}", unit, other.type_name()),
            ))
        }
    };
    Ok(Value::Quantity {
        value,
        unit: unit.to_string(),
    })
}

/// Lambdas; plain strings are accepted as lambda bodies
pub fn lambda(node: &ConfigNode) -> Coerced {
    match &node.value {
        Value::Lambda(code) | Value::String(code) => Ok(Value::Lambda(code.clone())),
        other => Err(fail(node, format!("lambda must be a string, got {}", other.type_name()))),
    }
}

/// C++ keywords plus the names the generated program already uses
const RESERVED_WORDS: &[&str] = &[
    // C++ keywords
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char16_t", "char32_t", "class", "compl", "const", "const_cast",
    "constexpr", "continue", "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto",
    "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "not", "not_eq",
    "nullptr", "operator", "or", "or_eq", "private", "protected", "public", "register",
    "reinterpret_cast", "return", "short", "signed", "sizeof", "static", "static_assert",
    "static_cast", "struct", "switch", "template", "this", "thread_local", "throw", "true",
    "try", "typedef", "typeid", "typename", "union", "unsigned", "using", "virtual", "void",
    "volatile", "wchar_t", "while", "xor", "xor_eq",
    // Generated program
    "App", "setup", "loop", "esphomelib", "std", "x", "NAN", "INFINITY",
];

/// Whether `name` would clash with a C++ keyword or a name of the generated program
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// Whether `name` is a usable C++ identifier
pub fn is_cpp_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
