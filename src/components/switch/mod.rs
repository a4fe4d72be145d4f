//! The `switch` domain
//!
//! Every entry picks a platform; the platform builds the switch object and
//! the shared code here registers it and wires up its triggers. Switch actions
//! and conditions for automations live here too.

pub mod custom;
pub mod template;

use crate::automation::actions::bind_object;
use crate::automation::{automation, build_triggered_automations, maybe_simple_id, ArgContext};
use crate::codegen::Expression;
use crate::compiler::{CompilationUnit, Component, Platform};
use crate::config::ConfigNode;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{Identifier, TypeTag};
use crate::schema::coerce;
use crate::schema::{MapSchema, Validator};

pub const USE_SWITCH_FLAG: &str = "-DUSE_SWITCH";

pub fn switch_type() -> TypeTag {
    TypeTag::new("switch_::Switch")
}

/// Keys shared by every switch object
pub fn switch_schema() -> MapSchema {
    MapSchema::new()
        .generate_id("id", switch_type())
        .required("name", Validator::String)
        .optional("icon", Validator::coerce("icon", coerce::icon))
        .optional("inverted", Validator::Boolean)
        .optional(
            "on_turn_on",
            automation(TypeTag::new("switch_::SwitchTurnOnTrigger"), MapSchema::new()),
        )
        .optional(
            "on_turn_off",
            automation(TypeTag::new("switch_::SwitchTurnOffTrigger"), MapSchema::new()),
        )
}

fn platform_base() -> MapSchema {
    MapSchema::new().required("platform", Validator::String)
}

/// `App.register_switch(var);` followed by the common switch setup
pub fn register_switch(
    unit: &mut CompilationUnit,
    var: &Identifier,
    config: &ConfigNode,
) -> ConfgenResult<()> {
    unit.add(Expression::raw("App").call("register_switch", vec![Expression::reference(var)]));
    setup_switch(unit, var, config)
}

/// Apply the common switch options to `var`
pub fn setup_switch(
    unit: &mut CompilationUnit,
    var: &Identifier,
    config: &ConfigNode,
) -> ConfgenResult<()> {
    let reference = Expression::reference(var);
    if let Some(inverted) = config.get_bool("inverted") {
        unit.add(reference.call("set_inverted", vec![Expression::bool(inverted)]));
    }
    if let Some(icon) = config.get_str("icon") {
        unit.add(reference.call("set_icon", vec![Expression::string(icon)]));
    }

    for (key, trigger) in [
        ("on_turn_on", "switch_::SwitchTurnOnTrigger"),
        ("on_turn_off", "switch_::SwitchTurnOffTrigger"),
    ] {
        if let Some(automations) = config.get(key) {
            let trigger_ty = TypeTag::new(trigger);
            build_triggered_automations(
                unit,
                &automations,
                &ArgContext::no_arg(),
                &trigger_ty,
                |_| Ok(Expression::new_object(TypeTag::new(trigger), vec![reference.clone()])),
            )?;
        }
    }
    Ok(())
}

/// The `switch` section: a list of platform entries
pub struct SwitchComponent {
    platforms: Vec<Box<dyn Platform>>,
}

impl SwitchComponent {
    pub fn new() -> Self {
        Self {
            platforms: vec![
                Box::new(custom::CustomPlatform),
                Box::new(template::TemplatePlatform),
            ],
        }
    }

    fn platform(&self, name: &str) -> Option<&dyn Platform> {
        self.platforms
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }
}

impl Default for SwitchComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SwitchComponent {
    fn key(&self) -> &'static str {
        "switch"
    }

    fn schema(&self) -> Validator {
        Validator::ensure_list(Validator::Dispatch {
            key: "platform".to_string(),
            choices: self
                .platforms
                .iter()
                .map(|p| (p.name().to_string(), platform_base().extend(p.schema())))
                .collect(),
        })
    }

    fn to_code(&self, unit: &mut CompilationUnit, config: &ConfigNode) -> ConfgenResult<()> {
        for item in config.items() {
            let name = item.get_str("platform").unwrap_or_default();
            let platform = self.platform(&name).ok_or_else(|| {
                ConfgenError::parse(format!("{}: unknown switch platform '{}'", item.path, name))
            })?;
            unit.enter_component(format!("switch.{}", name));
            unit.add_build_flag(USE_SWITCH_FLAG);
            platform.to_code(unit, &item)?;
        }
        Ok(())
    }
}

/// `switch.turn_on: relay` or `switch.turn_on: {id: relay}`
pub fn action_schema() -> Validator {
    maybe_simple_id(MapSchema::new().required("id", Validator::UseId(switch_type())))
}

pub fn condition_schema() -> Validator {
    action_schema()
}

fn target(unit: &CompilationUnit, config: &ConfigNode) -> ConfgenResult<Expression> {
    let id = config
        .get_id("id")
        .ok_or_else(|| ConfgenError::parse(format!("{}: no switch ID", config.path)))?;
    unit.get(&id)
}

fn build_state_action(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
    base: &str,
    factory: &str,
) -> ConfgenResult<Expression> {
    let rhs = target(unit, config)?.call_template(factory, vec![arg.ty().clone()], vec![]);
    let action = bind_object(unit, base, arg, rhs)?;
    Ok(Expression::reference(&action))
}

pub fn build_turn_on(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_state_action(unit, config, arg, "switch_::TurnOnAction", "make_turn_on_action")
}

pub fn build_turn_off(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_state_action(unit, config, arg, "switch_::TurnOffAction", "make_turn_off_action")
}

pub fn build_toggle(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_state_action(unit, config, arg, "switch_::ToggleAction", "make_toggle_action")
}

fn build_state_condition(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
    state: bool,
) -> ConfgenResult<Expression> {
    let var = target(unit, config)?;
    let rhs = Expression::new_object(
        arg.instantiate("switch_::SwitchCondition"),
        vec![var, Expression::bool(state)],
    );
    let condition = bind_object(unit, "switch_::SwitchCondition", arg, rhs)?;
    Ok(Expression::reference(&condition))
}

pub fn build_is_on(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_state_condition(unit, config, arg, true)
}

pub fn build_is_off(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_state_condition(unit, config, arg, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile_str, CompileOptions};
    use crate::errors::ConfgenError;

    const CORE: &str = "core:\n  name: dev\n  platform: esp8266\n  board: d1\n";

    #[test]
    fn test_switch_actions_reference_other_switches() {
        let source = format!(
            "{}switch:\n  - platform: template\n    name: Fan\n    id: fan\n    optimistic: true\n    on_turn_on:\n      - switch.turn_off: heater\n      - if:\n          condition:\n            switch.is_on: heater\n          then:\n            - switch.toggle:\n                id: heater\n  - platform: template\n    name: Heater\n    id: heater\n    optimistic: true\n",
            CORE
        );
        let program = compile_str(&source, CompileOptions::default()).unwrap();
        let fragment = program.fragment().unwrap();
        assert!(fragment.contains(
            "switch__turnoffaction = heater->make_turn_off_action<NoArg>();"
        ));
        assert!(fragment.contains(
            "switch__switchcondition = new switch_::SwitchCondition<NoArg>(heater, true);"
        ));
        assert!(fragment.contains("switch__toggleaction = heater->make_toggle_action<NoArg>();"));
        assert!(fragment.contains(
            "switch__switchturnontrigger = new switch_::SwitchTurnOnTrigger(fan);"
        ));
        assert!(fragment.contains("automation->add_actions({switch__turnoffaction, ifaction});"));
        let flags: Vec<&str> = program.metadata().flags().collect();
        assert!(flags.contains(&USE_SWITCH_FLAG));
    }

    #[test]
    fn test_action_target_must_be_a_switch() {
        let source = format!(
            "{}  on_boot:\n    trigger_id: boot_trigger\n    then:\n      - switch.turn_on: boot_trigger\n",
            CORE
        );
        let err = compile_str(&source, CompileOptions::default()).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors[0].message.contains("doesn't inherit from switch_::Switch"));
    }

    #[test]
    fn test_unknown_platform() {
        let source = format!("{}switch:\n  - platform: gpio\n    name: x\n", CORE);
        let err = compile_str(&source, CompileOptions::default()).unwrap_err();
        assert!(matches!(err, ConfgenError::Validation { .. }));
        let errors = err.validation_errors().unwrap();
        assert_eq!(errors[0].path.to_string(), "switch[0].platform");
    }
}
