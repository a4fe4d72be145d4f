//! Built-in actions

use crate::codegen::Expression;
use crate::compiler::CompilationUnit;
use crate::components::switch;
use crate::config::{ConfigNode, Value};
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{cpp, Binding, Identifier};
use crate::schema::{MapSchema, Validator};

use super::{action_list, build_conditions, condition_list, single_entry, ArgContext};

/// Builds the action object for one validated action config
pub type ActionBuilder = fn(&mut CompilationUnit, &ConfigNode, &ArgContext) -> ConfgenResult<Expression>;

/// An action that may appear in a `then` list
pub struct ActionSpec {
    pub key: &'static str,
    pub schema: fn() -> Validator,
    pub build: ActionBuilder,
}

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        key: "delay",
        schema: delay_schema,
        build: build_delay,
    },
    ActionSpec {
        key: "lambda",
        schema: lambda_schema,
        build: build_lambda,
    },
    ActionSpec {
        key: "if",
        schema: if_schema,
        build: build_if,
    },
    ActionSpec {
        key: "switch.turn_on",
        schema: switch::action_schema,
        build: switch::build_turn_on,
    },
    ActionSpec {
        key: "switch.turn_off",
        schema: switch::action_schema,
        build: switch::build_turn_off,
    },
    ActionSpec {
        key: "switch.toggle",
        schema: switch::action_schema,
        build: switch::build_toggle,
    },
];

/// One entry of an action list
pub(super) fn action_item() -> Validator {
    Validator::SingleKey {
        kind: "action".to_string(),
        entries: ACTIONS
            .iter()
            .map(|spec| (spec.key.to_string(), (spec.schema)()))
            .collect(),
    }
}

fn delay_schema() -> Validator {
    Validator::templatable(Validator::Duration)
}

fn lambda_schema() -> Validator {
    Validator::Lambda
}

fn if_schema() -> Validator {
    Validator::Map(
        MapSchema::new()
            .required("condition", condition_list())
            .optional("then", action_list())
            .optional("else", action_list()),
    )
}

/// Build every action of a validated action list, in order
pub fn build_actions(
    unit: &mut CompilationUnit,
    list: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Vec<Expression>> {
    let mut actions = Vec::new();
    for item in list.items() {
        let (key, config) = single_entry(&item, "action")?;
        let spec = ACTIONS
            .iter()
            .find(|spec| spec.key == key)
            .ok_or_else(|| ConfgenError::parse(format!("{}: unknown action '{}'", item.path, key)))?;
        actions.push((spec.build)(unit, &config, arg)?);
    }
    Ok(actions)
}

/// Declare and bind an internal action or condition object
pub(crate) fn bind_object(
    unit: &mut CompilationUnit,
    base: &str,
    arg: &ArgContext,
    rhs: Expression,
) -> ConfgenResult<Identifier> {
    let ty = arg.instantiate(base);
    let hint = crate::registry::TypeTag::new(base).id_hint();
    let identifier = unit.declare(&hint, ty, Binding::Pointer);
    unit.bind(&identifier, rhs)?;
    Ok(identifier)
}

fn build_delay(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    let rhs = Expression::raw("App").call(
        "register_component",
        vec![Expression::new_object(arg.instantiate("DelayAction"), vec![])],
    );
    let action = bind_object(unit, "DelayAction", arg, rhs)?;
    let path = config.path.clone();
    let delay = unit.templatable(config, &arg.params(), Some(&cpp::uint32()), |value| {
        match value {
            Value::Duration(d) => Ok(Expression::int(d.as_millis() as i64)),
            other => Err(ConfgenError::parse(format!(
                "{}: expected a duration, got {}",
                path,
                other.type_name()
            ))),
        }
    })?;
    unit.add(Expression::reference(&action).call("set_delay", vec![delay]));
    Ok(Expression::reference(&action))
}

fn build_lambda(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    let lambda = unit.lambda(config, &arg.params(), Some(&cpp::void()))?;
    let rhs = Expression::new_object(arg.instantiate("LambdaAction"), vec![lambda]);
    let action = bind_object(unit, "LambdaAction", arg, rhs)?;
    Ok(Expression::reference(&action))
}

fn build_if(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    let conditions = match config.get("condition") {
        Some(list) => build_conditions(unit, &list, arg)?,
        None => Vec::new(),
    };
    let rhs = Expression::new_object(
        arg.instantiate("IfAction"),
        vec![Expression::aggregate(conditions)],
    );
    let action = bind_object(unit, "IfAction", arg, rhs)?;

    for (key, method) in [("then", "add_then"), ("else", "add_else")] {
        if let Some(list) = config.get(key) {
            let actions = build_actions(unit, &list, arg)?;
            if !actions.is_empty() {
                unit.add(
                    Expression::reference(&action)
                        .call(method, vec![Expression::aggregate(actions)]),
                );
            }
        }
    }
    Ok(Expression::reference(&action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::BuildPaths;
    use crate::config::load_str;
    use crate::registry::TypeTag;

    fn render_all(unit: &CompilationUnit) -> Vec<String> {
        unit.statements()
            .iter()
            .map(|s| s.render(unit.registry()).unwrap())
            .collect()
    }

    fn build(yaml: &str, arg: &ArgContext) -> (CompilationUnit, Vec<Expression>) {
        let list = action_list().validate(&load_str(yaml).unwrap()).unwrap();
        let mut unit = CompilationUnit::new(BuildPaths::default());
        let actions = build_actions(&mut unit, &list, arg).unwrap();
        (unit, actions)
    }

    #[test]
    fn test_templated_delay() {
        let (unit, actions) = build(
            "delay: !lambda 'return x * 1000;'",
            &ArgContext::new(cpp::float()),
        );
        assert_eq!(actions.len(), 1);
        let lines = render_all(&unit);
        assert_eq!(lines[0], "delayaction = App.register_component(new DelayAction<float>());");
        assert_eq!(
            lines[1],
            "delayaction->set_delay([=](float x) -> uint32_t {\n  return x * 1000;\n});"
        );
    }

    #[test]
    fn test_if_with_else() {
        let (unit, actions) = build(
            "if:\n  condition:\n    lambda: 'return true;'\n  then:\n    - delay: 10ms\n  else:\n    - delay: 20ms",
            &ArgContext::no_arg(),
        );
        assert_eq!(actions.len(), 1);
        let lines = render_all(&unit);
        assert_eq!(
            lines[0],
            "lambdacondition = new LambdaCondition<NoArg>([=](NoArg x) -> bool {\n  return true;\n});"
        );
        assert_eq!(lines[1], "ifaction = new IfAction<NoArg>({lambdacondition});");
        assert!(lines.contains(&"ifaction->add_then({delayaction});".to_string()));
        assert!(lines.contains(&"ifaction->add_else({delayaction_2});".to_string()));
        assert_eq!(actions[0].render(unit.registry()).unwrap(), "ifaction");
    }

    #[test]
    fn test_unknown_action_suggests() {
        let errors = action_list()
            .validate(&load_str("- delya: 1s").unwrap())
            .unwrap_err();
        assert_eq!(errors[0].help.as_deref(), Some("did you mean 'delay'?"));
    }

    #[test]
    fn test_bind_object_names() {
        let mut unit = CompilationUnit::new(BuildPaths::default());
        let arg = ArgContext::no_arg();
        let a = bind_object(&mut unit, "switch_::TurnOnAction", &arg, Expression::null()).unwrap();
        assert_eq!(a.name(), "switch__turnonaction");
        assert_eq!(a.ty(), &TypeTag::new("switch_::TurnOnAction").template([cpp::no_arg()]));
    }
}
