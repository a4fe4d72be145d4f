//! Target-language expressions
//!
//! Expressions are immutable trees shared through `Rc`. They hold identifier
//! handles, not names, so rendering consults the registry: a reference to an
//! identifier without a definition fails instead of producing dangling code.

use std::fmt::Write as _;
use std::rc::Rc;

use super::statement::Statement;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{Binding, IdRegistry, Identifier, TypeTag};

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    HexInt(u64),
    Float(f64),
    String(String),
}

/// A lambda parameter, `<type> <name>`
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeTag,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeTag) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A lambda: `[capture](params) -> return_type { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaExpression {
    pub capture: String,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeTag>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Reference(Identifier),
    Member {
        receiver: Expression,
        member: String,
    },
    Call {
        receiver: Option<Expression>,
        member: String,
        template_args: Vec<TypeTag>,
        args: Vec<Expression>,
    },
    Construct {
        ty: TypeTag,
        args: Vec<Expression>,
        heap: bool,
    },
    Aggregate(Vec<Expression>),
    Lambda(LambdaExpression),
    /// Fragments rendered back to back, used for lambda body lines
    Concat(Vec<Expression>),
    Raw(String),
}

/// Shared, immutable expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expression(Rc<ExprKind>);

impl Expression {
    pub fn new(kind: ExprKind) -> Self {
        Expression(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    pub fn literal(literal: Literal) -> Self {
        Self::new(ExprKind::Literal(literal))
    }

    pub fn null() -> Self {
        Self::literal(Literal::Null)
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(Literal::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::literal(Literal::Int(value))
    }

    pub fn hex(value: u64) -> Self {
        Self::literal(Literal::HexInt(value))
    }

    pub fn float(value: f64) -> Self {
        Self::literal(Literal::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::literal(Literal::String(value.into()))
    }

    /// Verbatim target-language text
    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(ExprKind::Raw(text.into()))
    }

    pub fn reference(identifier: &Identifier) -> Self {
        Self::new(ExprKind::Reference(identifier.clone()))
    }

    /// Free function call: `name(args)`
    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Call {
            receiver: None,
            member: name.into(),
            template_args: Vec::new(),
            args,
        })
    }

    /// `new T(args)`
    pub fn new_object(ty: TypeTag, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Construct {
            ty,
            args,
            heap: true,
        })
    }

    /// `T(args)`
    pub fn construct(ty: TypeTag, args: Vec<Expression>) -> Self {
        Self::new(ExprKind::Construct {
            ty,
            args,
            heap: false,
        })
    }

    /// `{a, b, ...}`
    pub fn aggregate(items: Vec<Expression>) -> Self {
        Self::new(ExprKind::Aggregate(items))
    }

    pub fn lambda(lambda: LambdaExpression) -> Self {
        Self::new(ExprKind::Lambda(lambda))
    }

    pub fn concat(parts: Vec<Expression>) -> Self {
        Self::new(ExprKind::Concat(parts))
    }

    /// `self.member` or `self->member`
    pub fn member(&self, member: impl Into<String>) -> Self {
        Self::new(ExprKind::Member {
            receiver: self.clone(),
            member: member.into(),
        })
    }

    /// `self.` or `self->`, with the member written as raw text after it
    pub fn member_access(&self) -> Self {
        self.member("")
    }

    /// `self.member(args)` or `self->member(args)`
    pub fn call(&self, member: impl Into<String>, args: Vec<Expression>) -> Self {
        self.call_template(member, Vec::new(), args)
    }

    /// `self.member<T, ...>(args)`
    pub fn call_template(
        &self,
        member: impl Into<String>,
        template_args: Vec<TypeTag>,
        args: Vec<Expression>,
    ) -> Self {
        Self::new(ExprKind::Call {
            receiver: Some(self.clone()),
            member: member.into(),
            template_args,
            args,
        })
    }

    /// Identifiers referenced anywhere in this expression
    pub fn references(&self) -> Vec<Identifier> {
        let mut out = Vec::new();
        collect_references(self, &mut out);
        out
    }

    /// Render to target-language text
    pub fn render(&self, registry: &IdRegistry) -> ConfgenResult<String> {
        Renderer::new(registry).expression(self)
    }
}

fn collect_references(expr: &Expression, out: &mut Vec<Identifier>) {
    match expr.kind() {
        ExprKind::Reference(id) => out.push(id.clone()),
        ExprKind::Member { receiver, .. } => collect_references(receiver, out),
        ExprKind::Call { receiver, args, .. } => {
            if let Some(receiver) = receiver {
                collect_references(receiver, out);
            }
            args.iter().for_each(|a| collect_references(a, out));
        }
        ExprKind::Construct { args, .. }
        | ExprKind::Aggregate(args)
        | ExprKind::Concat(args) => args.iter().for_each(|a| collect_references(a, out)),
        ExprKind::Lambda(lambda) => lambda
            .body
            .iter()
            .for_each(|s| collect_references(s.rhs(), out)),
        ExprKind::Literal(_) | ExprKind::Raw(_) => {}
    }
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Expression::literal(literal)
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Expression::bool(value)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Expression::int(value)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::float(value)
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Expression::string(value)
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        Expression::string(value)
    }
}

impl From<&Identifier> for Expression {
    fn from(identifier: &Identifier) -> Self {
        Expression::reference(identifier)
    }
}

/// Quote a string as a C++ literal.
///
/// Bytes outside printable ASCII, backslash and double quote become
/// three-digit octal escapes.
pub fn cpp_string_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for byte in text.bytes() {
        if !(32..127).contains(&byte) || byte == b'\\' || byte == b'"' {
            let _ = write!(out, "\\{:03o}", byte);
        } else {
            out.push(byte as char);
        }
    }
    out.push('"');
    out
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Null => "nullptr".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(n) => n.to_string(),
        Literal::HexInt(n) => format!("0x{:02X}", n),
        Literal::Float(f) if f.is_nan() => "NAN".to_string(),
        Literal::Float(f) if f.is_infinite() && *f > 0.0 => "INFINITY".to_string(),
        Literal::Float(f) if f.is_infinite() => "-INFINITY".to_string(),
        Literal::Float(f) => format!("{:?}f", f),
        Literal::String(s) => cpp_string_escape(s),
    }
}

/// Renders expressions and statements against a registry
pub(crate) struct Renderer<'a> {
    registry: &'a IdRegistry,
    inline_stack: Vec<String>,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(registry: &'a IdRegistry) -> Self {
        Self {
            registry,
            inline_stack: Vec::new(),
        }
    }

    pub(crate) fn registry(&self) -> &IdRegistry {
        self.registry
    }

    pub(crate) fn expression(&mut self, expr: &Expression) -> ConfgenResult<String> {
        match expr.kind() {
            ExprKind::Literal(literal) => Ok(render_literal(literal)),
            ExprKind::Raw(text) => Ok(text.clone()),
            ExprKind::Reference(id) => self.reference(id),
            ExprKind::Member { receiver, member } => {
                let op = self.member_operator(receiver);
                Ok(format!("{}{}{}", self.expression(receiver)?, op, member))
            }
            ExprKind::Call {
                receiver,
                member,
                template_args,
                args,
            } => {
                let mut out = String::new();
                if let Some(receiver) = receiver {
                    out.push_str(&self.expression(receiver)?);
                    out.push_str(self.member_operator(receiver));
                }
                out.push_str(member);
                if !template_args.is_empty() {
                    let targs: Vec<String> = template_args.iter().map(|t| t.to_string()).collect();
                    let _ = write!(out, "<{}>", targs.join(", "));
                }
                let _ = write!(out, "({})", self.list(args)?);
                Ok(out)
            }
            ExprKind::Construct { ty, args, heap } => {
                let prefix = if *heap { "new " } else { "" };
                Ok(format!("{}{}({})", prefix, ty, self.list(args)?))
            }
            ExprKind::Aggregate(items) => Ok(format!("{{{}}}", self.list(items)?)),
            ExprKind::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&self.expression(part)?);
                }
                Ok(out)
            }
            ExprKind::Lambda(lambda) => self.lambda(lambda),
        }
    }

    fn list(&mut self, items: &[Expression]) -> ConfgenResult<String> {
        let rendered = items
            .iter()
            .map(|item| self.expression(item))
            .collect::<ConfgenResult<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }

    fn lambda(&mut self, lambda: &LambdaExpression) -> ConfgenResult<String> {
        let params: Vec<String> = lambda
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty, p.name))
            .collect();
        let mut out = format!("[{}]({})", lambda.capture, params.join(", "));
        if let Some(ret) = &lambda.return_type {
            let _ = write!(out, " -> {}", ret);
        }
        out.push_str(" {\n");
        for statement in &lambda.body {
            out.push_str(&statement.render_with(self)?);
            out.push('\n');
        }
        out.push('}');
        Ok(out)
    }

    fn member_operator(&self, receiver: &Expression) -> &'static str {
        if let ExprKind::Reference(id) = receiver.kind() {
            let binding = self
                .registry
                .get(id.name())
                .map(|d| d.identifier().binding())
                .unwrap_or(id.binding());
            if binding == Binding::Pointer {
                return "->";
            }
        }
        "."
    }

    fn reference(&mut self, id: &Identifier) -> ConfgenResult<String> {
        let registry = self.registry;
        let decl = registry.get(id.name()).ok_or_else(|| {
            ConfgenError::undeclared(id.name(), registry.component(), &registry.names())
        })?;
        let definition = decl.definition().ok_or_else(|| {
            ConfgenError::render(id.name(), decl.component(), "declared but never defined")
        })?;

        if decl.identifier().binding() != Binding::Inline {
            return Ok(id.name().to_string());
        }

        if self.inline_stack.iter().any(|n| n == id.name()) {
            return Err(ConfgenError::render(
                id.name(),
                decl.component(),
                "inline definition refers to itself",
            ));
        }
        self.inline_stack.push(id.name().to_string());
        let rendered = self.expression(definition);
        self.inline_stack.pop();
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::cpp;

    #[test]
    fn test_string_escape() {
        assert_eq!(cpp_string_escape("Hello"), "\"Hello\"");
        assert_eq!(cpp_string_escape("a\"b"), "\"a\\042b\"");
        assert_eq!(cpp_string_escape("a\nb"), "\"a\\012b\"");
        assert_eq!(cpp_string_escape("back\\slash"), "\"back\\134slash\"");
        assert_eq!(cpp_string_escape("°"), "\"\\302\\260\"");
    }

    #[test]
    fn test_literals() {
        let registry = IdRegistry::new();
        let render = |e: Expression| e.render(&registry).unwrap();
        assert_eq!(render(Expression::int(-5)), "-5");
        assert_eq!(render(Expression::hex(10)), "0x0A");
        assert_eq!(render(Expression::float(0.5)), "0.5f");
        assert_eq!(render(Expression::float(1.0)), "1.0f");
        assert_eq!(render(Expression::float(f64::NAN)), "NAN");
        assert_eq!(render(Expression::float(f64::INFINITY)), "INFINITY");
        assert_eq!(render(Expression::float(f64::NEG_INFINITY)), "-INFINITY");
        assert_eq!(render(Expression::float(-2.5)), "-2.5f");
        assert_eq!(render(Expression::bool(true)), "true");
        assert_eq!(render(Expression::null()), "nullptr");
        assert_eq!(
            render(Expression::aggregate(vec![Expression::int(1), Expression::int(2)])),
            "{1, 2}"
        );
    }

    #[test]
    fn test_calls_use_arrow_on_pointers() {
        let mut registry = IdRegistry::new();
        let relay = registry.declare("relay", TypeTag::new("switch_::Switch"), Binding::Pointer);
        let local = registry.declare("local", TypeTag::new("switch_::Switch"), Binding::Value);
        registry.define(&relay, Expression::null()).unwrap();
        registry.define(&local, Expression::null()).unwrap();

        let app = Expression::raw("App");
        let call = app.call("register_switch", vec![Expression::reference(&relay)]);
        assert_eq!(call.render(&registry).unwrap(), "App.register_switch(relay)");

        let call = Expression::reference(&relay).call("set_inverted", vec![true.into()]);
        assert_eq!(call.render(&registry).unwrap(), "relay->set_inverted(true)");

        let call = Expression::reference(&local).call("set_icon", vec!["mdi:fan".into()]);
        assert_eq!(call.render(&registry).unwrap(), "local.set_icon(\"mdi:fan\")");

        let templ = app.call_template(
            "make_automation",
            vec![cpp::no_arg()],
            vec![Expression::reference(&relay)],
        );
        assert_eq!(
            templ.render(&registry).unwrap(),
            "App.make_automation<NoArg>(relay)"
        );
    }

    #[test]
    fn test_construct() {
        let registry = IdRegistry::new();
        let heap = Expression::new_object(
            TypeTag::new("DelayAction").template([cpp::no_arg()]),
            vec![],
        );
        assert_eq!(heap.render(&registry).unwrap(), "new DelayAction<NoArg>()");
        let stack = Expression::construct(cpp::std_string(), vec!["x".into()]);
        assert_eq!(stack.render(&registry).unwrap(), "std::string(\"x\")");
    }

    #[test]
    fn test_undefined_reference_fails_to_render() {
        let mut registry = IdRegistry::new();
        let relay = registry.declare("relay", TypeTag::new("switch_::Switch"), Binding::Pointer);
        let expr = Expression::reference(&relay).call("turn_on", vec![]);
        assert!(matches!(
            expr.render(&registry),
            Err(ConfgenError::Render { ref name, .. }) if name == "relay"
        ));
        registry.define(&relay, Expression::null()).unwrap();
        assert_eq!(expr.render(&registry).unwrap(), "relay->turn_on()");
    }

    #[test]
    fn test_inline_renders_definition() {
        let mut registry = IdRegistry::new();
        let lambda = registry.declare("lambda", TypeTag::new("lambda"), Binding::Inline);
        let expr = Expression::function("wrap", vec![Expression::reference(&lambda)]);
        registry
            .define(
                &lambda,
                Expression::lambda(LambdaExpression {
                    capture: "=".to_string(),
                    params: vec![Parameter::new("x", cpp::float())],
                    return_type: Some(cpp::bool_()),
                    body: vec![Statement::line(Expression::raw("return x > 0;"))],
                }),
            )
            .unwrap();
        assert_eq!(
            expr.render(&registry).unwrap(),
            "wrap([=](float x) -> bool {\nreturn x > 0;\n})"
        );
    }

    #[test]
    fn test_self_referencing_inline_fails() {
        let mut registry = IdRegistry::new();
        let lambda = registry.declare("lambda", TypeTag::new("lambda"), Binding::Inline);
        registry
            .define(&lambda, Expression::concat(vec![Expression::reference(&lambda)]))
            .unwrap();
        assert!(matches!(
            Expression::reference(&lambda).render(&registry),
            Err(ConfgenError::Render { .. })
        ));
    }

    #[test]
    fn test_references() {
        let mut registry = IdRegistry::new();
        let a = registry.declare("a", cpp::float(), Binding::Value);
        let b = registry.declare("b", cpp::float(), Binding::Value);
        let expr = Expression::reference(&a).call("f", vec![Expression::reference(&b)]);
        let names: Vec<String> = expr.references().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
