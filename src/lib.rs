// Rust 1.93+ triggers false positives on thiserror/miette derive macro fields
#![allow(unused_assignments)]

//! Device Configuration Compiler
//!
//! Turns a declarative YAML device configuration into the C++ setup code of
//! an embedded firmware, plus the build metadata (libraries, flags, includes)
//! the native build needs.
//!
//! # Example
//!
//! ```yaml
//! core:
//!   name: livingroom
//!   platform: ESP8266
//!   board: nodemcuv2
//!
//! switch:
//!   - platform: template
//!     name: "Fan"
//!     optimistic: true
//! ```
//!
//! ```no_run
//! let program = confgen::compile_file(std::path::Path::new("livingroom.yaml"))?;
//! println!("{}", program.main_cpp()?);
//! # Ok::<(), confgen::ConfgenError>(())
//! ```

pub mod automation;
pub mod codegen;
pub mod compiler;
pub mod components;
pub mod config;
pub mod errors;
pub mod lambda;
pub mod registry;
pub mod schema;

pub use codegen::{
    cpp_string_escape, emit, Emitter, Expression, FragmentEmitter, MainCppEmitter, OutputKind,
    Statement,
};
pub use compiler::{
    compile_file, compile_str, BuildMetadata, BuildPaths, CompilationUnit, CompileOptions,
    Compiler, Component, ComponentCatalog, ExternalContext, ExternalRecord, IntegrationTransform,
    Platform, Program,
};
pub use config::{load_file, load_str, ConfigId, ConfigNode, ConfigPath, IdKind, Value};
pub use errors::{ConfgenError, ConfgenResult, ValidationError};
pub use registry::{Binding, IdRegistry, Identifier, IdentifierState, TypeTag};
pub use schema::{validate, MapSchema, Validator};
