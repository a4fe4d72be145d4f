//! Built-in sections
//!
//! `core` describes the device itself; `switch` is a platform-dispatched
//! domain showing how hardware components sit on top of the schema, registry,
//! lambda and automation machinery.

pub mod core;
pub mod switch;

pub use self::core::CoreComponent;
pub use self::switch::SwitchComponent;
