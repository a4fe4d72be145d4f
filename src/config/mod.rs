//! Configuration documents: values, paths, and loading from YAML

pub mod loader;
pub mod path;
pub mod value;

pub use loader::{load_file, load_str};
pub use path::{ConfigPath, PathSegment};
pub use value::{format_duration, ConfigId, ConfigNode, IdKind, Value};
