//! Built-in conditions

use crate::codegen::Expression;
use crate::compiler::CompilationUnit;
use crate::components::switch;
use crate::config::ConfigNode;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::cpp;
use crate::schema::Validator;

use super::actions::bind_object;
use super::{condition_list, single_entry, ArgContext};

/// Builds the condition object for one validated condition config
pub type ConditionBuilder =
    fn(&mut CompilationUnit, &ConfigNode, &ArgContext) -> ConfgenResult<Expression>;

/// A condition usable in `if` and in the boolean combinators
pub struct ConditionSpec {
    pub key: &'static str,
    pub schema: fn() -> Validator,
    pub build: ConditionBuilder,
}

pub const CONDITIONS: &[ConditionSpec] = &[
    ConditionSpec {
        key: "and",
        schema: condition_list,
        build: build_and,
    },
    ConditionSpec {
        key: "or",
        schema: condition_list,
        build: build_or,
    },
    ConditionSpec {
        key: "lambda",
        schema: lambda_schema,
        build: build_lambda,
    },
    ConditionSpec {
        key: "switch.is_on",
        schema: switch::condition_schema,
        build: switch::build_is_on,
    },
    ConditionSpec {
        key: "switch.is_off",
        schema: switch::condition_schema,
        build: switch::build_is_off,
    },
];

pub(super) fn condition_item() -> Validator {
    Validator::SingleKey {
        kind: "condition".to_string(),
        entries: CONDITIONS
            .iter()
            .map(|spec| (spec.key.to_string(), (spec.schema)()))
            .collect(),
    }
}

fn lambda_schema() -> Validator {
    Validator::Lambda
}

/// Build every condition of a validated condition list, in order
pub fn build_conditions(
    unit: &mut CompilationUnit,
    list: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Vec<Expression>> {
    let mut conditions = Vec::new();
    for item in list.items() {
        let (key, config) = single_entry(&item, "condition")?;
        let spec = CONDITIONS
            .iter()
            .find(|spec| spec.key == key)
            .ok_or_else(|| {
                ConfgenError::parse(format!("{}: unknown condition '{}'", item.path, key))
            })?;
        conditions.push((spec.build)(unit, &config, arg)?);
    }
    Ok(conditions)
}

fn build_combinator(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
    base: &str,
) -> ConfgenResult<Expression> {
    let inner = build_conditions(unit, config, arg)?;
    let rhs = Expression::new_object(arg.instantiate(base), vec![Expression::aggregate(inner)]);
    let condition = bind_object(unit, base, arg, rhs)?;
    Ok(Expression::reference(&condition))
}

fn build_and(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_combinator(unit, config, arg, "AndCondition")
}

fn build_or(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    build_combinator(unit, config, arg, "OrCondition")
}

fn build_lambda(
    unit: &mut CompilationUnit,
    config: &ConfigNode,
    arg: &ArgContext,
) -> ConfgenResult<Expression> {
    let lambda = unit.lambda(config, &arg.params(), Some(&cpp::bool_()))?;
    let rhs = Expression::new_object(arg.instantiate("LambdaCondition"), vec![lambda]);
    let condition = bind_object(unit, "LambdaCondition", arg, rhs)?;
    Ok(Expression::reference(&condition))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::BuildPaths;
    use crate::config::load_str;

    #[test]
    fn test_nested_combinators() {
        let list = condition_list()
            .validate(
                &load_str("and:\n  - lambda: 'return true;'\n  - or:\n      - lambda: 'return false;'")
                    .unwrap(),
            )
            .unwrap();
        let mut unit = CompilationUnit::new(BuildPaths::default());
        let conditions = build_conditions(&mut unit, &list, &ArgContext::no_arg()).unwrap();
        assert_eq!(conditions.len(), 1);
        let lines: Vec<String> = unit
            .statements()
            .iter()
            .map(|s| s.render(unit.registry()).unwrap())
            .collect();
        assert_eq!(
            lines.last().map(String::as_str),
            Some("andcondition = new AndCondition<NoArg>({lambdacondition, orcondition});")
        );
        assert!(lines.contains(&"orcondition = new OrCondition<NoArg>({lambdacondition_2});".to_string()));
    }

    #[test]
    fn test_two_conditions_in_one_item() {
        let errors = condition_list()
            .validate(&load_str("{lambda: 'return true;', and: []}").unwrap())
            .unwrap_err();
        assert!(errors[0].message.contains("cannot have two conditions"));
    }
}
