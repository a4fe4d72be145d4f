//! The `core` section: device name, target platform and global automations

use std::path::Path;

use crate::automation::{automation, build_triggered_automations, ArgContext};
use crate::codegen::Expression;
use crate::compiler::{include_directive, CompilationUnit, Component};
use crate::config::{ConfigNode, Value};
use crate::errors::{ConfgenError, ConfgenResult, ValidationError};
use crate::registry::{cpp, TypeTag};
use crate::schema::coerce;
use crate::schema::{MapSchema, Validator};

pub const FLASH_MODES: &[&str] = &["qio", "qout", "dio", "dout"];

/// Accepts the platform aliases and normalizes to `ESP8266` or `ESP32`
fn platform(node: &ConfigNode) -> Result<Value, ValidationError> {
    let text = coerce::string(node)?
        .as_str()
        .map(str::to_uppercase)
        .unwrap_or_default();
    match text.as_str() {
        "ESP8266" | "ESPRESSIF8266" => Ok(Value::from("ESP8266")),
        "ESP32" | "ESPRESSIF32" => Ok(Value::from("ESP32")),
        _ => Err(ValidationError::new(
            node.path.clone(),
            format!("invalid platform '{}'", text),
        )
        .with_help("only ESP8266 and ESP32 are supported")),
    }
}

pub fn schema() -> MapSchema {
    MapSchema::new()
        .required("name", Validator::ValidName)
        .required("platform", Validator::coerce("platform", platform))
        .required("board", Validator::String)
        .optional_default("use_custom_code", false, Validator::Boolean)
        .optional("build_path", Validator::String)
        .optional("board_flash_mode", Validator::one_of(FLASH_MODES))
        .optional(
            "on_boot",
            automation(
                TypeTag::new("StartupTrigger"),
                MapSchema::new().optional("priority", Validator::float()),
            ),
        )
        .optional(
            "on_shutdown",
            automation(TypeTag::new("ShutdownTrigger"), MapSchema::new()),
        )
        .optional(
            "on_loop",
            automation(TypeTag::new("LoopTrigger"), MapSchema::new()),
        )
        .optional("includes", Validator::ensure_list(Validator::String))
        .optional("libraries", Validator::ensure_list(Validator::StringStrict))
        .optional(
            "library_uri",
            Validator::invalid(
                "the library_uri option has been removed; pin the library version with libraries instead",
            ),
        )
        .optional(
            "use_build_flags",
            Validator::invalid("the use_build_flags option has been replaced by use_custom_code"),
        )
}

/// The `core` section
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreComponent;

impl Component for CoreComponent {
    fn key(&self) -> &'static str {
        "core"
    }

    fn schema(&self) -> Validator {
        Validator::Map(schema())
    }

    fn to_code(&self, unit: &mut CompilationUnit, config: &ConfigNode) -> ConfgenResult<()> {
        let app = Expression::raw("App");
        let name = config
            .get_str("name")
            .ok_or_else(|| ConfgenError::parse(format!("{}: core has no name", config.path)))?;
        unit.add(app.call("set_name", vec![Expression::string(name)]));

        if let Some(on_boot) = config.get("on_boot") {
            let trigger = TypeTag::new("StartupTrigger");
            build_triggered_automations(unit, &on_boot, &ArgContext::no_arg(), &trigger, |conf| {
                let args = conf
                    .get("priority")
                    .and_then(|p| p.value.as_float())
                    .map(|p| vec![Expression::float(p)])
                    .unwrap_or_default();
                Ok(app.call(
                    "register_component",
                    vec![Expression::new_object(TypeTag::new("StartupTrigger"), args)],
                ))
            })?;
        }

        if let Some(on_shutdown) = config.get("on_shutdown") {
            let trigger = TypeTag::new("ShutdownTrigger");
            let arg = ArgContext::new(cpp::const_char_ptr());
            build_triggered_automations(unit, &on_shutdown, &arg, &trigger, |_| {
                Ok(Expression::new_object(TypeTag::new("ShutdownTrigger"), vec![]))
            })?;
        }

        if let Some(on_loop) = config.get("on_loop") {
            let trigger = TypeTag::new("LoopTrigger");
            build_triggered_automations(unit, &on_loop, &ArgContext::no_arg(), &trigger, |_| {
                Ok(app.call(
                    "register_component",
                    vec![Expression::new_object(TypeTag::new("LoopTrigger"), vec![])],
                ))
            })?;
        }

        unit.add(app.call(
            "set_compilation_datetime",
            vec![Expression::raw("__DATE__ \", \" __TIME__")],
        ));

        if let Some(libraries) = config.get("libraries") {
            for library in libraries.items() {
                if let Some(library) = library.value.as_str() {
                    unit.add_library(library);
                }
            }
        }

        if let Some(includes) = config.get("includes") {
            let main_cpp = unit.paths().main_cpp();
            for include in includes.items() {
                let Some(file) = include.value.as_str() else {
                    continue;
                };
                let path = unit.paths().resolve(Path::new(file));
                unit.add_include(include_directive(&path, &main_cpp));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::BuildPaths;
    use crate::config::load_str;
    use crate::schema::resolve_ids;

    fn validated(yaml: &str) -> ConfigNode {
        let mut node = schema().validate(&load_str(yaml).unwrap()).unwrap();
        assert!(resolve_ids(&mut node).is_empty());
        node
    }

    #[test]
    fn test_platform_aliases() {
        let node = validated("name: a\nplatform: espressif32\nboard: esp32dev");
        assert_eq!(node.get_str("platform").as_deref(), Some("ESP32"));
        let errors = schema()
            .validate(&load_str("name: a\nplatform: avr\nboard: uno").unwrap())
            .unwrap_err();
        assert_eq!(errors[0].path.to_string(), "platform");
    }

    #[test]
    fn test_removed_options() {
        let errors = schema()
            .validate(&load_str("name: a\nplatform: esp8266\nboard: d1\nlibrary_uri: x").unwrap())
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("library_uri"));
    }

    #[test]
    fn test_flash_mode_is_normalized() {
        let node = validated("name: a\nplatform: esp8266\nboard: d1\nboard_flash_mode: DOUT");
        assert_eq!(node.get_str("board_flash_mode").as_deref(), Some("dout"));
    }

    #[test]
    fn test_infinite_priority_uses_math_constant() {
        let config = validated(
            "name: dev\nplatform: esp8266\nboard: d1\non_boot:\n  priority: .inf\n  then: []",
        );
        let mut unit = CompilationUnit::new(BuildPaths::new("/cfg", "/cfg/dev"));
        CoreComponent.to_code(&mut unit, &config).unwrap();
        let fragment = unit.finish(config).unwrap().fragment().unwrap();
        assert!(fragment.contains("new StartupTrigger(INFINITY)"), "{}", fragment);
        assert!(!fragment.contains("inff"));
    }

    #[test]
    fn test_triggers_and_metadata() {
        let config = validated(
            "name: dev\nplatform: esp8266\nboard: d1\n\
             on_boot:\n  priority: 600\n  then:\n    - delay: 1s\n\
             on_shutdown:\n  - lambda: 'ESP_LOGD(\"main\", \"%s\", x);'\n\
             libraries: [ArduinoJson, ArduinoJson]\n\
             includes: [custom/my_switch.h]",
        );
        let mut unit = CompilationUnit::new(BuildPaths::new("/cfg", "/cfg/dev"));
        CoreComponent.to_code(&mut unit, &config).unwrap();
        let program = unit.finish(config).unwrap();
        let fragment = program.fragment().unwrap();
        let lines: Vec<&str> = fragment.lines().collect();
        assert_eq!(lines[0], "App.set_name(\"dev\");");
        assert_eq!(
            lines[1],
            "startuptrigger = App.register_component(new StartupTrigger(600.0f));"
        );
        assert!(fragment.contains("shutdowntrigger = new ShutdownTrigger();"));
        assert!(fragment.contains("automation_2 = App.make_automation<const char *>(shutdowntrigger);"));
        assert!(fragment.contains("[=](const char * x) -> void {"));
        assert_eq!(
            lines.last().copied(),
            Some("App.set_compilation_datetime(__DATE__ \", \" __TIME__);")
        );
        let meta = program.metadata();
        assert_eq!(meta.required_libraries.len(), 1);
        assert_eq!(
            meta.include_directives,
            vec!["#include \"../../custom/my_switch.h\""]
        );
    }
}
