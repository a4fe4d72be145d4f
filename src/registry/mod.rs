//! Identifier registry
//!
//! Every named object in the generated program is declared here first and
//! defined at most once. Identifiers are plain handles; the registry owns their
//! state, so an expression can reference an identifier before its definition
//! exists and the reference is checked when the program is rendered.

pub mod types;

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

pub use types::{cpp, TypeTag};

use crate::codegen::Expression;
use crate::config::{ConfigId, IdKind};
use crate::errors::{ConfgenError, ConfgenResult};

/// How an identifier is bound in the generated program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Local of the setup function: `T name = rhs;`
    Value,
    /// Global pointer assigned in setup: `T *name;` plus `name = rhs;`
    Pointer,
    /// Never emitted as a variable; references render the definition in place
    Inline,
}

/// A handle to a registered name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    name: String,
    ty: TypeTag,
    binding: Binding,
}

impl Identifier {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeTag {
        &self.ty
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn is_pointer(&self) -> bool {
        self.binding == Binding::Pointer
    }
}

/// Lifecycle of a registered identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierState {
    Declared,
    Defined,
}

/// Registry entry for one identifier
#[derive(Debug, Clone)]
pub struct Declaration {
    identifier: Identifier,
    definition: Option<Expression>,
    component: String,
}

impl Declaration {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn definition(&self) -> Option<&Expression> {
        self.definition.as_ref()
    }

    /// The component that declared this identifier
    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> IdentifierState {
        if self.definition.is_some() {
            IdentifierState::Defined
        } else {
            IdentifierState::Declared
        }
    }
}

/// Make `name` usable as a C++ identifier
pub fn sanitize_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push_str("id");
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// `preferred` if free, else the first of `preferred_2`, `preferred_3`, ... that is
pub fn ensure_unique_name(preferred: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(preferred) {
        return preferred.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}", preferred, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

/// Name to identifier mapping for one compilation unit
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    entries: IndexMap<String, Declaration>,
    aliases: HashMap<String, String>,
    component: String,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self {
            component: "core".to_string(),
            ..Default::default()
        }
    }

    /// Attribute subsequent declarations and errors to `component`
    pub fn enter_component(&mut self, component: impl Into<String>) {
        self.component = component.into();
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Declare a new identifier named after `hint`.
    ///
    /// The hint is sanitized; if the name is taken, the smallest free numeric
    /// suffix starting at 2 is appended. Never fails.
    pub fn declare(&mut self, hint: &str, ty: TypeTag, binding: Binding) -> Identifier {
        let base = sanitize_name(hint);
        let name = ensure_unique_name(&base, |n| self.entries.contains_key(n));
        let identifier = Identifier { name, ty, binding };

        tracing::debug!(
            name = %identifier.name,
            ty = %identifier.ty,
            component = %self.component,
            "declared identifier"
        );

        self.entries.insert(
            identifier.name.clone(),
            Declaration {
                identifier: identifier.clone(),
                definition: None,
                component: self.component.clone(),
            },
        );
        identifier
    }

    /// Declare the identifier for a configuration ID and remember its alias.
    ///
    /// User-declared IDs are resolvable afterwards by their configuration name.
    pub fn declare_config(&mut self, id: &ConfigId, binding: Binding) -> Identifier {
        let identifier = self.declare(&id.name, id.ty.clone(), binding);
        if id.kind == IdKind::Declare {
            self.aliases
                .insert(id.name.clone(), identifier.name.clone());
        }
        identifier
    }

    /// Find the identifier a configuration name was declared as
    pub fn resolve(&self, config_name: &str) -> ConfgenResult<Identifier> {
        self.aliases
            .get(config_name)
            .and_then(|name| self.entries.get(name))
            .map(|decl| decl.identifier.clone())
            .ok_or_else(|| {
                let mut known: Vec<String> = self.aliases.keys().cloned().collect();
                known.sort();
                ConfgenError::undeclared(config_name, self.component.clone(), &known)
            })
    }

    /// Expression referring to a declared identifier
    pub fn lookup(&self, identifier: &Identifier) -> ConfgenResult<Expression> {
        let decl = self.get(identifier.name()).ok_or_else(|| {
            ConfgenError::undeclared(identifier.name(), self.component.clone(), &self.names())
        })?;
        Ok(Expression::reference(&decl.identifier))
    }

    /// Change the type or binding of an identifier that has no definition yet
    pub fn refine(
        &mut self,
        identifier: &Identifier,
        ty: Option<TypeTag>,
        binding: Binding,
    ) -> ConfgenResult<Identifier> {
        let component = self.component.clone();
        let known = self.names();
        let decl = self
            .entries
            .get_mut(identifier.name())
            .ok_or_else(|| ConfgenError::undeclared(identifier.name(), component.clone(), &known))?;
        if decl.definition.is_some() {
            return Err(ConfgenError::duplicate_definition(identifier.name(), component));
        }
        if let Some(ty) = ty {
            decl.identifier.ty = ty;
        }
        decl.identifier.binding = binding;
        Ok(decl.identifier.clone())
    }

    /// Attach the single definition of a declared identifier
    pub fn define(&mut self, identifier: &Identifier, expression: Expression) -> ConfgenResult<()> {
        let component = self.component.clone();
        let known = self.names();
        let decl = self
            .entries
            .get_mut(identifier.name())
            .ok_or_else(|| ConfgenError::undeclared(identifier.name(), component.clone(), &known))?;
        if decl.definition.is_some() {
            return Err(ConfgenError::duplicate_definition(identifier.name(), component));
        }
        decl.definition = Some(expression);
        tracing::debug!(name = %identifier.name(), component = %component, "defined identifier");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.entries.get(name)
    }

    pub fn state(&self, name: &str) -> Option<IdentifierState> {
        self.entries.get(name).map(Declaration::state)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.state(name) == Some(IdentifierState::Defined)
    }

    pub fn definition(&self, name: &str) -> Option<&Expression> {
        self.entries.get(name).and_then(|d| d.definition.as_ref())
    }

    /// Registered names in declaration order
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Configuration names that were declared through [`IdRegistry::declare_config`]
    pub fn config_names(&self) -> HashSet<&str> {
        self.aliases.keys().map(String::as_str).collect()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.entries.values()
    }

    /// Identifiers that were declared but never defined
    pub fn undefined(&self) -> impl Iterator<Item = &Identifier> {
        self.entries
            .values()
            .filter(|d| d.definition.is_none())
            .map(|d| &d.identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
