//! `platform: template`: a switch driven by a state lambda and action lists

use super::{register_switch, switch_schema};
use crate::automation::{action_list, build_action_automation, ArgContext};
use crate::codegen::Expression;
use crate::compiler::{CompilationUnit, Platform};
use crate::config::ConfigNode;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{cpp, TypeTag};
use crate::schema::{MapSchema, Validator};

pub const USE_TEMPLATE_SWITCH_FLAG: &str = "-DUSE_TEMPLATE_SWITCH";

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplatePlatform;

impl Platform for TemplatePlatform {
    fn name(&self) -> &'static str {
        "template"
    }

    fn schema(&self) -> MapSchema {
        switch_schema()
            .generate_id("id", TypeTag::new("switch_::TemplateSwitch"))
            .optional("lambda", Validator::Lambda)
            .optional("optimistic", Validator::Boolean)
            .optional("turn_on_action", action_list())
            .optional("turn_off_action", action_list())
    }

    fn to_code(&self, unit: &mut CompilationUnit, config: &ConfigNode) -> ConfgenResult<()> {
        let id = config
            .get_id("id")
            .ok_or_else(|| ConfgenError::parse(format!("{}: missing 'id'", config.path)))?;
        let name = config.get_str("name").unwrap_or_default();

        let object = Expression::new_object(
            TypeTag::new("switch_::TemplateSwitch"),
            vec![Expression::string(name)],
        );
        let rhs = Expression::raw("App").call("register_component", vec![object]);
        let var = unit.pvariable(&id, rhs, None)?;
        register_switch(unit, &var, config)?;

        let reference = Expression::reference(&var);
        if let Some(lambda) = config.get("lambda") {
            let state = unit.lambda(&lambda, &[], Some(&cpp::optional(cpp::bool_())))?;
            unit.add(reference.call("set_state_lambda", vec![state]));
        }
        if let Some(optimistic) = config.get_bool("optimistic") {
            unit.add(reference.call("set_optimistic", vec![Expression::bool(optimistic)]));
        }

        for (key, trigger) in [
            ("turn_on_action", "get_turn_on_trigger"),
            ("turn_off_action", "get_turn_off_trigger"),
        ] {
            if let Some(actions) = config.get(key) {
                build_action_automation(
                    unit,
                    reference.call(trigger, vec![]),
                    &ArgContext::no_arg(),
                    &actions,
                )?;
            }
        }

        unit.add_build_flag(USE_TEMPLATE_SWITCH_FLAG);
        Ok(())
    }
}
