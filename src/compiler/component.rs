//! Component and platform contracts, and the catalog of known sections

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use super::CompilationUnit;
use crate::config::ConfigNode;
use crate::errors::ConfgenResult;
use crate::schema::{MapSchema, Validator};

/// A top-level configuration section with its own schema and code generator
pub trait Component {
    /// Section key in the configuration document
    fn key(&self) -> &'static str;

    /// Schema for the section's value
    fn schema(&self) -> Validator;

    /// Emit the statements and metadata for a validated section
    fn to_code(&self, unit: &mut CompilationUnit, config: &ConfigNode) -> ConfgenResult<()>;
}

/// One `platform:` choice inside a platform-dispatched section
pub trait Platform {
    fn name(&self) -> &'static str;

    /// Keys specific to this platform; merged over the section's common keys
    fn schema(&self) -> MapSchema;

    fn to_code(&self, unit: &mut CompilationUnit, config: &ConfigNode) -> ConfgenResult<()>;
}

/// Context handed to integration transforms
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExternalContext {
    /// Device name from the `core` section
    pub device_name: String,
    /// Anything else the caller wants to pass through
    pub extra: IndexMap<String, serde_json::Value>,
}

/// A record in a third-party integration representation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalRecord {
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Maps a normalized section to records for an external integration.
///
/// Transforms are pure; the compiler ships none of its own.
pub trait IntegrationTransform {
    fn transform(&self, ctx: &ExternalContext, config: &ConfigNode) -> Vec<ExternalRecord>;
}

/// Registered sections by key, plus their optional integration transforms
pub struct ComponentCatalog {
    components: IndexMap<String, Box<dyn Component>>,
    transforms: HashMap<String, Box<dyn IntegrationTransform>>,
}

impl ComponentCatalog {
    /// A catalog with no sections
    pub fn empty() -> Self {
        Self {
            components: IndexMap::new(),
            transforms: HashMap::new(),
        }
    }

    /// Register a section; a later registration for the same key replaces it
    pub fn register(&mut self, component: Box<dyn Component>) {
        self.components
            .insert(component.key().to_string(), component);
    }

    pub fn register_transform(
        &mut self,
        section: impl Into<String>,
        transform: Box<dyn IntegrationTransform>,
    ) {
        self.transforms.insert(section.into(), transform);
    }

    pub fn get(&self, key: &str) -> Option<&dyn Component> {
        self.components.get(key).map(|c| c.as_ref())
    }

    pub fn transform(&self, section: &str) -> Option<&dyn IntegrationTransform> {
        self.transforms.get(section).map(|t| t.as_ref())
    }

    pub fn keys(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }
}

impl Default for ComponentCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        catalog.register(Box::new(crate::components::core::CoreComponent));
        catalog.register(Box::new(crate::components::switch::SwitchComponent::new()));
        catalog
    }
}

impl std::fmt::Debug for ComponentCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut transforms: Vec<&String> = self.transforms.keys().collect();
        transforms.sort();
        f.debug_struct("ComponentCatalog")
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("transforms", &transforms)
            .finish()
    }
}
