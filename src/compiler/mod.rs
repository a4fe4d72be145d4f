//! Compiler driver
//!
//! The compiler runs one configuration document through the full pipeline:
//! 1. Validate every section against its component's schema
//! 2. Resolve IDs across the whole document
//! 3. Pre-declare every user ID so sections can reference each other
//! 4. Run each component's code generator, `core` first
//! 5. Seal the statements, registry and metadata into a [`Program`]

pub mod component;
pub mod metadata;
pub mod unit;

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::codegen::{emit, OutputKind, Statement};
use crate::config::{load_file, load_str, ConfigNode, Value};
use crate::errors::{unknown_name_help, ConfgenError, ConfgenResult, ValidationError};
use crate::registry::IdRegistry;
use crate::schema::{declared_ids, resolve_ids};

pub use component::{
    Component, ComponentCatalog, ExternalContext, ExternalRecord, IntegrationTransform, Platform,
};
pub use metadata::{include_directive, relative_path, BuildMetadata};
pub use unit::{BuildPaths, CompilationUnit};

/// Section every document must have
pub const CORE_SECTION: &str = "core";

/// The output of one compilation run
#[derive(Debug, Clone)]
pub struct Program {
    statements: Vec<Statement>,
    registry: IdRegistry,
    metadata: BuildMetadata,
    config: ConfigNode,
}

impl Program {
    pub fn new(
        statements: Vec<Statement>,
        registry: IdRegistry,
        metadata: BuildMetadata,
        config: ConfigNode,
    ) -> Self {
        Self {
            statements,
            registry,
            metadata,
            config,
        }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn registry(&self) -> &IdRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &BuildMetadata {
        &self.metadata
    }

    /// The normalized configuration the program was generated from
    pub fn config(&self) -> &ConfigNode {
        &self.config
    }

    /// The setup statements, one per line
    pub fn fragment(&self) -> ConfgenResult<String> {
        self.emit(OutputKind::Fragment)
    }

    /// A complete `main.cpp`
    pub fn main_cpp(&self) -> ConfgenResult<String> {
        self.emit(OutputKind::MainCpp)
    }

    pub fn emit(&self, kind: OutputKind) -> ConfgenResult<String> {
        emit(self, kind)
    }
}

/// Path handling for a compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Directory relative paths in the configuration are resolved against
    pub config_dir: PathBuf,
    /// Build directory to use instead of `core.build_path`
    pub build_path_override: Option<PathBuf>,
}

impl CompileOptions {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            build_path_override: None,
        }
    }

    pub fn with_build_path(mut self, build_path: impl Into<PathBuf>) -> Self {
        self.build_path_override = Some(build_path.into());
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Compiler from configuration documents to programs
#[derive(Debug)]
pub struct Compiler {
    catalog: ComponentCatalog,
    options: CompileOptions,
}

impl Compiler {
    /// Create a compiler with the built-in components
    pub fn new(options: CompileOptions) -> Self {
        Self::with_catalog(ComponentCatalog::default(), options)
    }

    pub fn with_catalog(catalog: ComponentCatalog, options: CompileOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &ComponentCatalog {
        &self.catalog
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Validate a raw document.
    ///
    /// Every section is validated even when an earlier one fails; the ID pass
    /// only runs once all sections are valid.
    pub fn validate(&self, document: &ConfigNode) -> ConfgenResult<ConfigNode> {
        let has_core = match &document.value {
            Value::Map(map) => map.contains_key(CORE_SECTION),
            Value::Null => false,
            other => {
                return Err(ConfgenError::validation(vec![ValidationError::new(
                    document.path.clone(),
                    format!("expected a mapping of sections, got {}", other.type_name()),
                )]))
            }
        };

        let known = self.catalog.keys();
        let mut errors = Vec::new();
        let mut out = IndexMap::new();

        if !has_core {
            errors.push(
                ValidationError::new(
                    document.path.key(CORE_SECTION),
                    format!("required section '{}' not provided", CORE_SECTION),
                )
                .with_help("add a core section with at least name, platform and board"),
            );
        }

        for (key, node) in document.entries() {
            let Some(component) = self.catalog.get(&key) else {
                errors.push(
                    ValidationError::new(node.path.clone(), format!("component '{}' not found", key))
                        .with_help(unknown_name_help(&key, &known, "components")),
                );
                continue;
            };
            tracing::debug!(section = %key, "validating section");
            match component.schema().validate(&node) {
                Ok(valid) => {
                    out.insert(key, valid.value);
                }
                Err(errs) => errors.push(ValidationError::fold(node.path.clone(), errs)),
            }
        }

        if !errors.is_empty() {
            return Err(ConfgenError::validation(errors));
        }

        let mut config = ConfigNode::new(document.path.clone(), Value::Map(out));
        let id_errors = resolve_ids(&mut config);
        if !id_errors.is_empty() {
            return Err(ConfgenError::validation(id_errors));
        }
        Ok(config)
    }

    /// Where the build goes for a validated configuration
    pub fn build_paths(&self, config: &ConfigNode) -> BuildPaths {
        let core = config.get(CORE_SECTION);
        let build_path = match &self.options.build_path_override {
            Some(path) => path.clone(),
            None => core
                .as_ref()
                .and_then(|c| c.get_str("build_path").or_else(|| c.get_str("name")))
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("build")),
        };
        let build_path = if build_path.is_absolute() {
            build_path
        } else {
            self.options.config_dir.join(build_path)
        };
        BuildPaths::new(self.options.config_dir.clone(), build_path)
    }

    /// Generate code for a validated configuration
    pub fn generate(&self, config: ConfigNode) -> ConfgenResult<Program> {
        let mut unit = CompilationUnit::new(self.build_paths(&config));

        let mut order: Vec<(String, ConfigNode)> = config.entries();
        order.sort_by_key(|(key, _)| key != CORE_SECTION);

        for (key, node) in &order {
            unit.enter_component(key.as_str());
            for id in declared_ids(node) {
                unit.predeclare(&id);
            }
        }

        for (key, node) in &order {
            let component = self.catalog.get(key).ok_or_else(|| {
                ConfgenError::parse(format!("component '{}' not found", key))
            })?;
            unit.enter_component(key.as_str());
            component.to_code(&mut unit, node)?;
        }

        unit.finish(config)
    }

    /// Validate and generate
    pub fn compile(&self, document: &ConfigNode) -> ConfgenResult<Program> {
        let config = self.validate(document)?;
        self.generate(config)
    }

    /// Run the registered integration transforms over a validated configuration
    pub fn integration_records(&self, config: &ConfigNode) -> Vec<ExternalRecord> {
        let ctx = ExternalContext {
            device_name: config
                .get(CORE_SECTION)
                .and_then(|core| core.get_str("name"))
                .unwrap_or_default(),
            ..Default::default()
        };
        config
            .entries()
            .into_iter()
            .filter_map(|(key, node)| {
                self.catalog
                    .transform(&key)
                    .map(|transform| transform.transform(&ctx, &node))
            })
            .flatten()
            .collect()
    }
}

/// Compile YAML text with the built-in components
pub fn compile_str(source: &str, options: CompileOptions) -> ConfgenResult<Program> {
    let document = load_str(source)?;
    Compiler::new(options).compile(&document)
}

/// Compile a YAML file; relative paths resolve against its directory
pub fn compile_file(path: &Path) -> ConfgenResult<Program> {
    let document = load_file(path)?;
    let config_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Compiler::new(CompileOptions::new(config_dir)).compile(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::IdentifierState;

    const MINIMAL: &str = "core:\n  name: livingroom\n  platform: esp8266\n  board: nodemcuv2\n";

    #[test]
    fn test_minimal_program() {
        let program = compile_str(MINIMAL, CompileOptions::default()).unwrap();
        assert_eq!(
            program.fragment().unwrap(),
            "App.set_name(\"livingroom\");\n\
             App.set_compilation_datetime(__DATE__ \", \" __TIME__);\n"
        );
        assert_eq!(program.config().get("core").unwrap().get_str("platform").as_deref(), Some("ESP8266"));
    }

    #[test]
    fn test_missing_core_and_unknown_section() {
        let err = compile_str("swich: []\n", CompileOptions::default()).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path.to_string(), "core");
        assert_eq!(errors[1].path.to_string(), "swich");
        assert_eq!(errors[1].help.as_deref(), Some("did you mean 'switch'?"));
    }

    #[test]
    fn test_errors_from_all_sections() {
        let source = "core:\n  name: Bad Name\n  platform: esp8266\n  board: x\nswitch:\n  - platform: template\n    name: Fan\n    optimistic: maybe\n";
        let err = compile_str(source, CompileOptions::default()).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].path.to_string(), "core.name");
        assert_eq!(errors[1].path.to_string(), "switch[0].optimistic");
    }

    #[test]
    fn test_build_path_defaults_to_name() {
        let compiler = Compiler::new(CompileOptions::new("/cfg"));
        let config = compiler.validate(&load_str(MINIMAL).unwrap()).unwrap();
        let paths = compiler.build_paths(&config);
        assert_eq!(paths.build_path, PathBuf::from("/cfg/livingroom"));
        assert_eq!(paths.main_cpp(), PathBuf::from("/cfg/livingroom/src/main.cpp"));

        let compiler = Compiler::new(CompileOptions::new("/cfg").with_build_path("/tmp/out"));
        assert_eq!(compiler.build_paths(&config).build_path, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_core_runs_first() {
        let source = "switch:\n  - platform: template\n    name: Fan\n    optimistic: true\ncore:\n  name: dev\n  platform: esp32\n  board: esp32dev\n";
        let program = compile_str(source, CompileOptions::default()).unwrap();
        let fragment = program.fragment().unwrap();
        assert!(fragment.starts_with("App.set_name(\"dev\");"));
        assert!(program
            .registry()
            .declarations()
            .all(|d| d.state() == IdentifierState::Defined));
    }

    struct NameTransform;

    impl IntegrationTransform for NameTransform {
        fn transform(&self, ctx: &ExternalContext, config: &ConfigNode) -> Vec<ExternalRecord> {
            config
                .items()
                .iter()
                .map(|item| ExternalRecord {
                    kind: "switch".to_string(),
                    payload: serde_json::json!({
                        "device": ctx.device_name,
                        "name": item.get_str("name"),
                    }),
                })
                .collect()
        }
    }

    #[test]
    fn test_integration_records() {
        let mut catalog = ComponentCatalog::default();
        catalog.register_transform("switch", Box::new(NameTransform));
        let compiler = Compiler::with_catalog(catalog, CompileOptions::default());
        let source = format!(
            "{}switch:\n  - platform: template\n    name: Fan\n",
            MINIMAL
        );
        let config = compiler.validate(&load_str(&source).unwrap()).unwrap();
        let records = compiler.integration_records(&config);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["device"], "livingroom");
        assert_eq!(records[0].payload["name"], "Fan");
    }
}
