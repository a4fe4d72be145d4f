//! `platform: custom`: switches created by user C++ code
//!
//! The lambda returns a vector of switches; the constructor object owns them
//! and each configured entry retrieves one by index. The constructor is a
//! global pointer so lambdas of earlier sections may refer to it.

use super::{register_switch, switch_schema, switch_type};
use crate::codegen::Expression;
use crate::compiler::{CompilationUnit, Platform};
use crate::config::ConfigNode;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{cpp, TypeTag};
use crate::schema::{MapSchema, Validator};

pub const USE_CUSTOM_SWITCH_FLAG: &str = "-DUSE_CUSTOM_SWITCH";

fn constructor_type() -> TypeTag {
    TypeTag::new("switch_::CustomSwitchConstructor")
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CustomPlatform;

impl Platform for CustomPlatform {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn schema(&self) -> MapSchema {
        MapSchema::new()
            .generate_id("id", constructor_type())
            .required("lambda", Validator::Lambda)
            .required(
                "switches",
                Validator::ensure_list(Validator::Map(switch_schema())),
            )
    }

    fn to_code(&self, unit: &mut CompilationUnit, config: &ConfigNode) -> ConfgenResult<()> {
        let missing = |key: &str| ConfgenError::parse(format!("{}: missing '{}'", config.path, key));
        let lambda = config.get("lambda").ok_or_else(|| missing("lambda"))?;
        let id = config.get_id("id").ok_or_else(|| missing("id"))?;
        let switches = config.get("switches").ok_or_else(|| missing("switches"))?;

        // The body may reference the switches retrieved below
        let return_type = cpp::std_vector(switch_type().pointer());
        let pending = unit.declare_lambda(&lambda, &[], Some(&return_type))?;
        let rhs = Expression::new_object(constructor_type(), vec![pending.reference()]);
        let custom = unit.pvariable(&id, rhs, None)?;
        unit.define_lambda(pending)?;

        let mut created = Vec::new();
        for (i, entry) in switches.items().into_iter().enumerate() {
            let entry_id = entry.get_id("id").ok_or_else(|| missing("id"))?;
            let rhs = Expression::reference(&custom).call("get_switch", vec![Expression::int(i as i64)]);
            let var = unit.pvariable(&entry_id, rhs, None)?;
            created.push((var, entry));
        }

        for (var, entry) in &created {
            if let Some(name) = entry.get_str("name") {
                unit.add(Expression::reference(var).call("set_name", vec![Expression::string(name)]));
            }
            register_switch(unit, var, entry)?;
        }

        unit.add_build_flag(USE_CUSTOM_SWITCH_FLAG);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{compile_str, CompileOptions};
    use pretty_assertions::assert_eq;

    const CORE: &str = "core:\n  name: dev\n  platform: esp8266\n  board: d1\n";

    #[test]
    fn test_single_switch_is_wrapped() {
        let source = format!(
            "{}switch:\n  - platform: custom\n    lambda: 'return {{new MySwitch()}};'\n    switches:\n      name: Only\n",
            CORE
        );
        let program = compile_str(&source, CompileOptions::default()).unwrap();
        let fragment = program.fragment().unwrap();
        let lines: Vec<&str> = fragment.lines().collect();
        assert_eq!(
            &lines[2..6],
            &[
                "switch__customswitchconstructor = new switch_::CustomSwitchConstructor([=]() -> std::vector<switch_::Switch *> {",
                "  return {new MySwitch()};",
                "});",
                "switch__switch = switch__customswitchconstructor->get_switch(0);",
            ]
        );
        let flags: Vec<&str> = program.metadata().flags().collect();
        assert_eq!(flags, vec!["-DUSE_CUSTOM_SWITCH", "-DUSE_SWITCH"]);
    }

    #[test]
    fn test_lambda_may_reference_its_own_switches() {
        let source = format!(
            "{}switch:\n  - platform: custom\n    id: ctor\n    lambda: |-\n      auto s = new MySwitch();\n      return {{s}};\n    switches:\n      - name: A\n        id: a\n        on_turn_on:\n          - lambda: 'id(ctor);'\n",
            CORE
        );
        let program = compile_str(&source, CompileOptions::default()).unwrap();
        let fragment = program.fragment().unwrap();
        assert!(fragment.contains("a = ctor->get_switch(0);"));
        assert!(fragment.contains("App.register_switch(a);"));
        assert!(fragment.contains("  ctor;"));
    }
}
