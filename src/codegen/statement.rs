//! Statements of the generated setup function

use super::expression::{Expression, Renderer};
use crate::errors::ConfgenResult;
use crate::registry::{Binding, IdRegistry, Identifier};

/// Indentation unit of generated code
pub const INDENT: &str = "  ";

/// A statement with an optional bound identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    lhs: Option<Identifier>,
    rhs: Expression,
    terminated: bool,
}

impl Statement {
    /// `name = rhs;` or `Type name = rhs;`, depending on the binding
    pub fn bind(lhs: Identifier, rhs: Expression) -> Self {
        Self {
            lhs: Some(lhs),
            rhs,
            terminated: true,
        }
    }

    /// `rhs;`
    pub fn expression(rhs: Expression) -> Self {
        Self {
            lhs: None,
            rhs,
            terminated: true,
        }
    }

    /// A line of embedded code, emitted as is
    pub fn line(rhs: Expression) -> Self {
        Self {
            lhs: None,
            rhs,
            terminated: false,
        }
    }

    pub fn lhs(&self) -> Option<&Identifier> {
        self.lhs.as_ref()
    }

    pub fn rhs(&self) -> &Expression {
        &self.rhs
    }

    pub fn render(&self, registry: &IdRegistry) -> ConfgenResult<String> {
        self.render_with(&mut Renderer::new(registry))
    }

    pub(crate) fn render_with(&self, renderer: &mut Renderer<'_>) -> ConfgenResult<String> {
        let rhs = renderer.expression(&self.rhs)?;
        if !self.terminated {
            return Ok(rhs);
        }
        let text = match &self.lhs {
            None => format!("{};", rhs),
            Some(lhs) => {
                // Type and binding may have been refined after the handle was taken
                let current = renderer
                    .registry()
                    .get(lhs.name())
                    .map(|d| d.identifier().clone())
                    .unwrap_or_else(|| lhs.clone());
                match current.binding() {
                    Binding::Pointer => format!("{} = {};", current.name(), rhs),
                    Binding::Value => format!("{} {} = {};", current.ty(), current.name(), rhs),
                    Binding::Inline => format!("auto {} = {};", current.name(), rhs),
                }
            }
        };
        Ok(indent_all_but_first_and_last(&text, INDENT))
    }

    /// Global declaration a pointer statement needs, `Type *name;`
    pub fn global_declaration(&self, registry: &IdRegistry) -> Option<String> {
        let lhs = self.lhs.as_ref()?;
        let current = registry
            .get(lhs.name())
            .map(|d| d.identifier().clone())
            .unwrap_or_else(|| lhs.clone());
        if current.binding() != Binding::Pointer {
            return None;
        }
        Some(format!("{} *{};", current.ty(), current.name()))
    }
}

/// Indent every line but the first and the last.
///
/// Text of two lines or fewer is returned unchanged.
pub fn indent_all_but_first_and_last(text: &str, padding: &str) -> String {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    if lines.len() <= 2 {
        return text.to_string();
    }
    let last = lines.len() - 1;
    let mut out = String::with_capacity(text.len() + padding.len() * last);
    for (i, line) in lines.iter().enumerate() {
        if i != 0 && i != last {
            out.push_str(padding);
        }
        out.push_str(line);
    }
    out
}

/// Indent every line of `text`
pub fn indent(text: &str, padding: &str) -> String {
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", padding, line)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::expression::LambdaExpression;
    use crate::registry::{cpp, TypeTag};

    #[test]
    fn test_indent_all_but_first_and_last() {
        assert_eq!(indent_all_but_first_and_last("a\nb", "  "), "a\nb");
        assert_eq!(indent_all_but_first_and_last("a\nb\nc", "  "), "a\n  b\nc");
        assert_eq!(
            indent_all_but_first_and_last("a\nb\nc\nd\n", "  "),
            "a\n  b\n  c\nd\n"
        );
    }

    #[test]
    fn test_bindings() {
        let mut registry = IdRegistry::new();
        let relay = registry.declare("relay", TypeTag::new("switch_::Switch"), Binding::Pointer);
        let name = registry.declare("name", cpp::std_string(), Binding::Value);
        let ptr = Statement::bind(relay.clone(), Expression::null());
        let val = Statement::bind(name.clone(), Expression::string("x"));
        registry.define(&relay, Expression::null()).unwrap();
        registry.define(&name, Expression::string("x")).unwrap();

        assert_eq!(ptr.render(&registry).unwrap(), "relay = nullptr;");
        assert_eq!(
            ptr.global_declaration(&registry).unwrap(),
            "switch_::Switch *relay;"
        );
        assert_eq!(val.render(&registry).unwrap(), "std::string name = \"x\";");
        assert!(val.global_declaration(&registry).is_none());

        let bare = Statement::expression(Expression::raw("App").call("setup", vec![]));
        assert_eq!(bare.render(&registry).unwrap(), "App.setup();");
    }

    #[test]
    fn test_multiline_lambda_statement_is_indented() {
        let mut registry = IdRegistry::new();
        let lambda = LambdaExpression {
            capture: "=".to_string(),
            params: vec![],
            return_type: Some(cpp::bool_()),
            body: vec![
                Statement::line(Expression::raw("bool a = true;")),
                Statement::line(Expression::raw("return a;")),
            ],
        };
        let id = registry.declare("sw", TypeTag::new("switch_::TemplateSwitch"), Binding::Pointer);
        let stmt = Statement::expression(
            Expression::reference(&id).call("set_state_lambda", vec![Expression::lambda(lambda)]),
        );
        registry.define(&id, Expression::null()).unwrap();
        assert_eq!(
            stmt.render(&registry).unwrap(),
            "sw->set_state_lambda([=]() -> bool {\n  bool a = true;\n  return a;\n});"
        );
    }
}
