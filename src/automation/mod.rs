//! Automations: triggers connected to ordered action lists
//!
//! Every trigger passes one argument type to its actions (`NoArg` when it has
//! nothing to pass). Actions and conditions are instantiated for that type,
//! and their lambdas receive it as `x`.

pub mod actions;
pub mod conditions;

use indexmap::IndexMap;

use crate::codegen::{Expression, Parameter};
use crate::compiler::CompilationUnit;
use crate::config::{ConfigId, ConfigNode, Value};
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{cpp, Identifier, TypeTag};
use crate::schema::{MapSchema, Validator};

pub use actions::{build_actions, ActionSpec, ACTIONS};
pub use conditions::{build_conditions, ConditionSpec, CONDITIONS};

/// The argument a trigger hands to its actions
#[derive(Debug, Clone, PartialEq)]
pub struct ArgContext {
    ty: TypeTag,
}

impl ArgContext {
    pub fn new(ty: TypeTag) -> Self {
        Self { ty }
    }

    pub fn no_arg() -> Self {
        Self::new(cpp::no_arg())
    }

    pub fn ty(&self) -> &TypeTag {
        &self.ty
    }

    /// Lambda parameters for this context, `(<type> x)`
    pub fn params(&self) -> Vec<Parameter> {
        vec![Parameter::new("x", self.ty.clone())]
    }

    /// `Base<T>` for this context's argument type
    pub fn instantiate(&self, base: &str) -> TypeTag {
        TypeTag::new(base).template([self.ty.clone()])
    }
}

/// A list of actions; a single action is accepted too
pub fn action_list() -> Validator {
    Validator::ensure_list(Validator::Lazy(actions::action_item))
}

/// A list of conditions; a single condition is accepted too
pub fn condition_list() -> Validator {
    Validator::ensure_list(Validator::Lazy(conditions::condition_item))
}

/// Automation for a trigger of type `trigger`, with extra trigger options
pub fn automation(trigger: TypeTag, extra: MapSchema) -> Validator {
    Validator::Automation(
        MapSchema::new()
            .generate_id("trigger_id", trigger)
            .generate_id("automation_id", TypeTag::new("Automation"))
            .required("then", action_list())
            .extend(extra),
    )
}

/// A mapping that may be written as just its `id`
pub fn maybe_simple_id(schema: MapSchema) -> Validator {
    Validator::AllOf(vec![
        Validator::coerce("maybe_simple_id", |node: &ConfigNode| match &node.value {
            Value::Map(_) => Ok(node.value.clone()),
            other => {
                let mut map = IndexMap::new();
                map.insert("id".to_string(), other.clone());
                Ok(Value::Map(map))
            }
        }),
        Validator::Map(schema),
    ])
}

/// Create the automation object for `trigger` and attach its actions.
///
/// Emits `automation = App.make_automation<T>(trigger);` followed by
/// `automation->add_actions({...});` when there are actions.
fn attach_actions(
    unit: &mut CompilationUnit,
    id: &ConfigId,
    trigger: Expression,
    arg: &ArgContext,
    then: &ConfigNode,
) -> ConfgenResult<Identifier> {
    let rhs = Expression::raw("App").call_template(
        "make_automation",
        vec![arg.ty().clone()],
        vec![trigger],
    );
    let automation = unit.pvariable(id, rhs, Some(arg.instantiate("Automation")))?;

    let actions = build_actions(unit, then, arg)?;
    if !actions.is_empty() {
        unit.add(
            Expression::reference(&automation)
                .call("add_actions", vec![Expression::aggregate(actions)]),
        );
    }
    Ok(automation)
}

/// Build one validated automation (`then` plus its IDs) for `trigger`
pub fn build_automation(
    unit: &mut CompilationUnit,
    trigger: Expression,
    arg: &ArgContext,
    config: &ConfigNode,
) -> ConfgenResult<Identifier> {
    let id = config
        .get_id("automation_id")
        .unwrap_or_else(|| ConfigId::generated(TypeTag::new("Automation")));
    let then = config.get("then").ok_or_else(|| {
        ConfgenError::parse(format!("{}: automation has no 'then'", config.path))
    })?;
    attach_actions(unit, &id, trigger, arg, &then)
}

/// Build an automation straight from an action list, e.g. `turn_on_action`
pub fn build_action_automation(
    unit: &mut CompilationUnit,
    trigger: Expression,
    arg: &ArgContext,
    actions: &ConfigNode,
) -> ConfgenResult<Identifier> {
    let id = ConfigId::generated(TypeTag::new("Automation"));
    attach_actions(unit, &id, trigger, arg, actions)
}

/// Build every automation of a trigger key, creating one trigger per automation.
///
/// `make_trigger` returns the trigger's constructor expression.
pub fn build_triggered_automations(
    unit: &mut CompilationUnit,
    automations: &ConfigNode,
    arg: &ArgContext,
    trigger_ty: &TypeTag,
    mut make_trigger: impl FnMut(&ConfigNode) -> ConfgenResult<Expression>,
) -> ConfgenResult<()> {
    for config in automations.items() {
        let trigger_id = config
            .get_id("trigger_id")
            .unwrap_or_else(|| ConfigId::generated(trigger_ty.clone()));
        let rhs = make_trigger(&config)?;
        let trigger = unit.pvariable(&trigger_id, rhs, Some(trigger_ty.clone()))?;
        build_automation(unit, Expression::reference(&trigger), arg, &config)?;
    }
    Ok(())
}

/// First key and value of a single-key item
pub(crate) fn single_entry(item: &ConfigNode, kind: &str) -> ConfgenResult<(String, ConfigNode)> {
    item.entries().into_iter().next().ok_or_else(|| {
        ConfgenError::parse(format!("{}: expected a {}", item.path, kind))
    })
}
