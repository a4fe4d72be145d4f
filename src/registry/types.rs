//! Target-language type tags
//!
//! A [`TypeTag`] names a C++ type the generated code constructs or passes
//! around. Class types know their ancestors so ID references can be checked
//! against the type a component expects.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Scalar and library types that need no catalog entry.
const SCALAR_TYPES: &[&str] = &[
    "void",
    "bool",
    "float",
    "double",
    "int",
    "int8_t",
    "int16_t",
    "int32_t",
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "size_t",
    "char",
    "const char",
    "std::string",
    "NoArg",
];

/// Template containers that accept arbitrary known arguments.
const TEMPLATE_TYPES: &[&str] = &["std::vector", "optional", "std::array"];

/// Known classes and their ancestors (nearest first, transitively closed).
const CLASS_CATALOG: &[(&str, &[&str])] = &[
    ("Application", &[]),
    ("Nameable", &[]),
    ("Component", &[]),
    ("PollingComponent", &["Component"]),
    ("Trigger", &[]),
    ("Action", &[]),
    ("Condition", &[]),
    ("Automation", &[]),
    ("StartupTrigger", &["Trigger", "Component"]),
    ("ShutdownTrigger", &["Trigger"]),
    ("LoopTrigger", &["Trigger", "Component"]),
    ("DelayAction", &["Action", "Component"]),
    ("LambdaAction", &["Action"]),
    ("IfAction", &["Action"]),
    ("AndCondition", &["Condition"]),
    ("OrCondition", &["Condition"]),
    ("LambdaCondition", &["Condition"]),
    ("switch_::Switch", &["Nameable"]),
    ("switch_::CustomSwitchConstructor", &[]),
    (
        "switch_::TemplateSwitch",
        &["switch_::Switch", "Nameable", "Component"],
    ),
    ("switch_::TurnOnAction", &["Action"]),
    ("switch_::TurnOffAction", &["Action"]),
    ("switch_::ToggleAction", &["Action"]),
    ("switch_::SwitchCondition", &["Condition"]),
    ("switch_::SwitchTurnOnTrigger", &["Trigger"]),
    ("switch_::SwitchTurnOffTrigger", &["Trigger"]),
];

/// A C++ type: base name, template arguments and pointer-ness.
///
/// Equality ignores the ancestor list, which is derived from the name.
#[derive(Debug, Clone)]
pub struct TypeTag {
    name: String,
    template_args: Vec<TypeTag>,
    pointer: bool,
    ancestors: Vec<String>,
}

impl TypeTag {
    /// Create a type tag, attaching ancestors from the class catalog.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let ancestors = CLASS_CATALOG
            .iter()
            .find(|(class, _)| *class == name)
            .map(|(_, parents)| parents.iter().map(|p| p.to_string()).collect())
            .unwrap_or_default();
        Self {
            name,
            template_args: Vec::new(),
            pointer: false,
            ancestors,
        }
    }

    /// Instantiate this type with template arguments
    pub fn template(mut self, args: impl IntoIterator<Item = TypeTag>) -> Self {
        self.template_args = args.into_iter().collect();
        self
    }

    /// The pointer type `T *`
    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template_args(&self) -> &[TypeTag] {
        &self.template_args
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer
    }

    /// Whether a value of this type can be used where `other` is expected.
    ///
    /// Nominal on the base name; class types also match any ancestor.
    pub fn derives_from(&self, other: &TypeTag) -> bool {
        if self == other {
            return true;
        }
        if self.pointer != other.pointer || !other.template_args.is_empty() {
            return false;
        }
        self.ancestors.iter().any(|a| *a == other.name)
    }

    /// Name hint for identifiers generated for this type.
    ///
    /// `switch_::Switch` becomes `switch__switch`, `StartupTrigger` becomes
    /// `startuptrigger`.
    pub fn id_hint(&self) -> String {
        self.name.replace("::", "_").replace(' ', "_").to_lowercase()
    }

    /// Parse a type written in an embedded lambda header.
    ///
    /// Only scalar types, catalog classes and the known template containers
    /// are accepted; anything else yields `None`.
    pub fn parse(text: &str) -> Option<TypeTag> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(stripped) = text.strip_suffix('*') {
            let inner = TypeTag::parse(stripped)?;
            if inner.pointer {
                return None;
            }
            return Some(inner.pointer());
        }

        if let Some(open) = text.find('<') {
            if !text.ends_with('>') {
                return None;
            }
            let base = text[..open].trim();
            if !TEMPLATE_TYPES.contains(&base) {
                return None;
            }
            let inner = &text[open + 1..text.len() - 1];
            let args = split_template_args(inner)?
                .into_iter()
                .map(TypeTag::parse)
                .collect::<Option<Vec<_>>>()?;
            if args.is_empty() {
                return None;
            }
            return Some(TypeTag::new(base).template(args));
        }

        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let known = SCALAR_TYPES.contains(&normalized.as_str())
            || CLASS_CATALOG.iter().any(|(class, _)| *class == normalized);
        if known {
            Some(TypeTag::new(normalized))
        } else {
            None
        }
    }
}

/// Split `A, B<C, D>` at top-level commas. Returns `None` on unbalanced brackets.
fn split_template_args(text: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.pointer == other.pointer
            && self.template_args == other.template_args
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.pointer.hash(state);
        self.template_args.hash(state);
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.template_args.is_empty() {
            let args: Vec<String> = self.template_args.iter().map(|t| t.to_string()).collect();
            write!(f, "<{}>", args.join(", "))?;
        }
        if self.pointer {
            write!(f, " *")?;
        }
        Ok(())
    }
}

/// Commonly used tags.
pub mod cpp {
    use super::TypeTag;

    pub fn no_arg() -> TypeTag {
        TypeTag::new("NoArg")
    }

    pub fn void() -> TypeTag {
        TypeTag::new("void")
    }

    pub fn bool_() -> TypeTag {
        TypeTag::new("bool")
    }

    pub fn float() -> TypeTag {
        TypeTag::new("float")
    }

    pub fn uint32() -> TypeTag {
        TypeTag::new("uint32_t")
    }

    pub fn std_string() -> TypeTag {
        TypeTag::new("std::string")
    }

    pub fn const_char_ptr() -> TypeTag {
        TypeTag::new("const char").pointer()
    }

    pub fn optional(inner: TypeTag) -> TypeTag {
        TypeTag::new("optional").template([inner])
    }

    pub fn std_vector(inner: TypeTag) -> TypeTag {
        TypeTag::new("std::vector").template([inner])
    }
}
