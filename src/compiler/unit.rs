//! The compilation unit: registry, statement list and metadata of one run

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::metadata::BuildMetadata;
use super::Program;
use crate::codegen::{Expression, Parameter, Statement};
use crate::config::{ConfigId, ConfigNode, IdKind, Value};
use crate::errors::{ConfgenError, ConfgenResult};
use crate::lambda::{self, PendingLambda};
use crate::registry::{Binding, IdRegistry, Identifier, TypeTag};

/// Where the configuration lives and where the build goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    pub config_dir: PathBuf,
    pub build_path: PathBuf,
}

impl BuildPaths {
    pub fn new(config_dir: impl Into<PathBuf>, build_path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            build_path: build_path.into(),
        }
    }

    /// Location of the generated translation unit
    pub fn main_cpp(&self) -> PathBuf {
        self.build_path.join("src").join("main.cpp")
    }

    /// A path from the configuration, anchored at the configuration directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

impl Default for BuildPaths {
    fn default() -> Self {
        Self::new(".", "build")
    }
}

/// Mutable state of one code generation run
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    registry: IdRegistry,
    statements: Vec<Statement>,
    metadata: BuildMetadata,
    paths: BuildPaths,
}

impl CompilationUnit {
    pub fn new(paths: BuildPaths) -> Self {
        Self {
            registry: IdRegistry::new(),
            statements: Vec::new(),
            metadata: BuildMetadata::new(),
            paths,
        }
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut IdRegistry {
        &mut self.registry
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn metadata(&self) -> &BuildMetadata {
        &self.metadata
    }

    pub fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    /// Attribute what follows to `component`
    pub fn enter_component(&mut self, component: impl Into<String>) {
        let component = component.into();
        tracing::debug!(component = %component, "generating component");
        self.registry.enter_component(component);
    }

    pub fn component(&self) -> &str {
        self.registry.component()
    }

    pub fn add_library(&mut self, library: impl Into<String>) {
        self.metadata.add_library(library);
    }

    /// Request a build flag on behalf of the current component
    pub fn add_build_flag(&mut self, flag: impl Into<String>) {
        let component = self.registry.component().to_string();
        self.metadata.add_build_flag(flag, component);
    }

    pub fn add_include(&mut self, directive: impl Into<String>) {
        self.metadata.add_include(directive);
    }

    /// Declare an internal identifier named after `hint`
    pub fn declare(&mut self, hint: &str, ty: TypeTag, binding: Binding) -> Identifier {
        self.registry.declare(hint, ty, binding)
    }

    /// Declare a user ID ahead of code generation so it can be referenced early
    pub fn predeclare(&mut self, id: &ConfigId) -> Identifier {
        self.registry.declare_config(id, Binding::Pointer)
    }

    /// The identifier for a configuration ID about to be defined.
    ///
    /// User IDs reuse their pre-declared identifier, with `ty` and `binding`
    /// applied; generated IDs are declared now.
    pub fn declare_id(
        &mut self,
        id: &ConfigId,
        ty: Option<TypeTag>,
        binding: Binding,
    ) -> ConfgenResult<Identifier> {
        match id.kind {
            IdKind::Generated => {
                let ty = ty.unwrap_or_else(|| id.ty.clone());
                Ok(self.registry.declare(&id.name, ty, binding))
            }
            IdKind::Declare | IdKind::Use => {
                let identifier = match self.registry.resolve(&id.name) {
                    Ok(identifier) => identifier,
                    Err(_) if id.kind == IdKind::Declare => {
                        self.registry.declare_config(id, binding)
                    }
                    Err(e) => return Err(e),
                };
                self.registry.refine(&identifier, ty, binding)
            }
        }
    }

    /// Expression referring to the object a configuration ID names
    pub fn get(&self, id: &ConfigId) -> ConfgenResult<Expression> {
        let identifier = self.registry.resolve(&id.name)?;
        self.registry.lookup(&identifier)
    }

    /// Define `identifier` as `rhs` and emit the binding statement
    pub fn bind(&mut self, identifier: &Identifier, rhs: Expression) -> ConfgenResult<()> {
        self.registry.define(identifier, rhs.clone())?;
        self.statements.push(Statement::bind(identifier.clone(), rhs));
        Ok(())
    }

    /// Emit `expr;`
    pub fn add(&mut self, expr: Expression) {
        self.statements.push(Statement::expression(expr));
    }

    /// Bind a configuration ID as a local: `Type name = rhs;`
    pub fn variable(
        &mut self,
        id: &ConfigId,
        rhs: Expression,
        ty: Option<TypeTag>,
    ) -> ConfgenResult<Identifier> {
        let identifier = self.declare_id(id, ty, Binding::Value)?;
        self.bind(&identifier, rhs)?;
        Ok(identifier)
    }

    /// Bind a configuration ID as a global pointer: `name = rhs;`
    pub fn pvariable(
        &mut self,
        id: &ConfigId,
        rhs: Expression,
        ty: Option<TypeTag>,
    ) -> ConfgenResult<Identifier> {
        let identifier = self.declare_id(id, ty, Binding::Pointer)?;
        self.bind(&identifier, rhs)?;
        Ok(identifier)
    }

    fn lambda_source(node: &ConfigNode) -> ConfgenResult<&str> {
        match &node.value {
            Value::Lambda(code) | Value::String(code) => Ok(code),
            other => Err(ConfgenError::parse(format!(
                "{}: expected a lambda, got {}",
                node.path,
                other.type_name()
            ))),
        }
    }

    /// First phase of a lambda; see [`crate::lambda`]
    pub fn declare_lambda(
        &mut self,
        node: &ConfigNode,
        params: &[Parameter],
        return_type: Option<&TypeTag>,
    ) -> ConfgenResult<PendingLambda> {
        let source = Self::lambda_source(node)?;
        lambda::declare_lambda(&mut self.registry, source, &node.path, params, return_type)
    }

    pub fn define_lambda(&mut self, pending: PendingLambda) -> ConfgenResult<Expression> {
        lambda::define_lambda(&mut self.registry, pending)
    }

    /// Compile a lambda node
    pub fn lambda(
        &mut self,
        node: &ConfigNode,
        params: &[Parameter],
        return_type: Option<&TypeTag>,
    ) -> ConfgenResult<Expression> {
        let source = Self::lambda_source(node)?;
        lambda::process_lambda(&mut self.registry, source, &node.path, params, return_type)
    }

    /// A lambda if the node holds one, else the literal built by `literal`
    pub fn templatable(
        &mut self,
        node: &ConfigNode,
        params: &[Parameter],
        return_type: Option<&TypeTag>,
        literal: impl FnOnce(&Value) -> ConfgenResult<Expression>,
    ) -> ConfgenResult<Expression> {
        match &node.value {
            Value::Lambda(_) => self.lambda(node, params, return_type),
            value => literal(value),
        }
    }

    /// Fail on a local referenced by a statement that runs before the local
    /// is bound. Lambdas are followed to the references of their bodies.
    fn check_binding_order(&self) -> ConfgenResult<()> {
        let mut bound_at: HashMap<&str, usize> = HashMap::new();
        for (index, statement) in self.statements.iter().enumerate() {
            if let Some(lhs) = statement.lhs() {
                bound_at.entry(lhs.name()).or_insert(index);
            }
        }
        for (index, statement) in self.statements.iter().enumerate() {
            let mut pending = statement.rhs().references();
            let mut seen: HashSet<String> = HashSet::new();
            while let Some(identifier) = pending.pop() {
                if !seen.insert(identifier.name().to_string()) {
                    continue;
                }
                let Some(decl) = self.registry.get(identifier.name()) else {
                    continue;
                };
                match decl.identifier().binding() {
                    Binding::Value => {
                        if bound_at.get(identifier.name()).is_some_and(|&at| at >= index) {
                            return Err(ConfgenError::render(
                                identifier.name(),
                                decl.component(),
                                "used before its definition",
                            ));
                        }
                    }
                    Binding::Inline => {
                        if let Some(definition) = decl.definition() {
                            pending.extend(definition.references());
                        }
                    }
                    Binding::Pointer => {}
                }
            }
        }
        Ok(())
    }

    /// Check every reference and seal the unit into a program
    pub fn finish(self, config: ConfigNode) -> ConfgenResult<Program> {
        let mut referenced: HashSet<String> = HashSet::new();
        for statement in &self.statements {
            statement.render(&self.registry)?;
            referenced.extend(statement.rhs().references().into_iter().map(|i| i.name().to_string()));
        }
        self.check_binding_order()?;
        for decl in self.registry.declarations() {
            if let Some(definition) = decl.definition() {
                referenced.extend(definition.references().into_iter().map(|i| i.name().to_string()));
            }
        }
        for identifier in self.registry.undefined() {
            if !referenced.contains(identifier.name()) {
                let component = self
                    .registry
                    .get(identifier.name())
                    .map(|d| d.component().to_string())
                    .unwrap_or_default();
                tracing::warn!(
                    name = %identifier.name(),
                    component = %component,
                    "identifier declared but never defined or used"
                );
            }
        }

        tracing::debug!(
            statements = self.statements.len(),
            identifiers = self.registry.len(),
            "compilation unit finished"
        );

        Ok(Program::new(
            self.statements,
            self.registry,
            self.metadata,
            config,
        ))
    }
}
