//! Embedded lambdas
//!
//! A lambda is compiled in two phases. [`declare_lambda`] parses the header,
//! checks it against the call site and declares an inline identifier that can
//! be referenced right away. [`define_lambda`] later rewrites the body's
//! `id(name)` references and attaches the definition. Components that need the
//! lambda inside an aggregate created before its body can be resolved use the
//! two phases separately; everything else calls [`process_lambda`].

pub mod header;

use std::sync::OnceLock;

use regex::Regex;

pub use header::{parse_lambda, LambdaHeader, ParsedLambda};

use crate::codegen::{Expression, LambdaExpression, Parameter, Statement};
use crate::config::ConfigPath;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::{Binding, IdRegistry, Identifier, TypeTag};

static ID_CALL: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn id_call_pattern() -> ConfgenResult<&'static Regex> {
    ID_CALL
        .get_or_init(|| Regex::new(r"id\(\s*([a-zA-Z_][a-zA-Z0-9_]*)\s*\)(\.?)"))
        .as_ref()
        .map_err(|e| ConfgenError::parse(format!("invalid id() pattern: {}", e)))
}

/// A lambda whose identifier exists but whose body is not yet compiled
#[derive(Debug, Clone)]
pub struct PendingLambda {
    identifier: Identifier,
    params: Vec<Parameter>,
    return_type: Option<TypeTag>,
    body: String,
}

impl PendingLambda {
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Expression that renders as the finished lambda
    pub fn reference(&self) -> Expression {
        Expression::reference(&self.identifier)
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&TypeTag> {
        self.return_type.as_ref()
    }
}

fn signature(params: &[Parameter], return_type: Option<&TypeTag>) -> String {
    let types: Vec<String> = params.iter().map(|p| p.ty.to_string()).collect();
    let mut out = format!("({})", types.join(", "));
    if let Some(ret) = return_type {
        out.push_str(&format!(" -> {}", ret));
    }
    out
}

/// Phase one: parse and check the header, declare the lambda identifier
pub fn declare_lambda(
    registry: &mut IdRegistry,
    source: &str,
    path: &ConfigPath,
    params: &[Parameter],
    return_type: Option<&TypeTag>,
) -> ConfgenResult<PendingLambda> {
    let parsed = parse_lambda(source)?;

    let (params, return_type) = match parsed.header {
        None => (params.to_vec(), return_type.cloned()),
        Some(header) => {
            let types_match = header.params.len() == params.len()
                && header
                    .params
                    .iter()
                    .zip(params)
                    .all(|(written, expected)| written.ty == expected.ty);
            let return_matches = match (&header.return_type, return_type) {
                (Some(written), Some(expected)) => written == expected,
                _ => true,
            };
            if !types_match || !return_matches {
                return Err(ConfgenError::argument_mismatch(
                    path.to_string(),
                    signature(params, return_type),
                    signature(&header.params, header.return_type.as_ref()),
                ));
            }
            let return_type = header.return_type.or_else(|| return_type.cloned());
            (header.params, return_type)
        }
    };

    let identifier = registry.declare("lambda", TypeTag::new("lambda"), Binding::Inline);
    tracing::debug!(name = %identifier.name(), path = %path, "declared lambda");

    Ok(PendingLambda {
        identifier,
        params,
        return_type,
        body: parsed.body,
    })
}

/// Phase two: resolve `id()` references in the body and define the lambda
pub fn define_lambda(registry: &mut IdRegistry, pending: PendingLambda) -> ConfgenResult<Expression> {
    let pattern = id_call_pattern()?;
    let mut body = Vec::new();

    for line in pending.body.lines() {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in pattern.captures_iter(line) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(Expression::raw(&line[last..whole.start()]));
            }
            let identifier = registry.resolve(name.as_str())?;
            let member_access = caps.get(2).map(|m| m.as_str() == ".").unwrap_or(false);
            let reference = Expression::reference(&identifier);
            if member_access {
                // The operator follows the binding the identifier has when rendered
                parts.push(reference.member_access());
            } else {
                parts.push(reference);
            }
            last = whole.end();
        }
        if last < line.len() {
            parts.push(Expression::raw(&line[last..]));
        }
        body.push(Statement::line(Expression::concat(parts)));
    }

    let identifier = pending.identifier.clone();
    registry.define(
        &identifier,
        Expression::lambda(LambdaExpression {
            capture: "=".to_string(),
            params: pending.params,
            return_type: pending.return_type,
            body,
        }),
    )?;
    Ok(Expression::reference(&identifier))
}

/// Compile a lambda in one go
pub fn process_lambda(
    registry: &mut IdRegistry,
    source: &str,
    path: &ConfigPath,
    params: &[Parameter],
    return_type: Option<&TypeTag>,
) -> ConfgenResult<Expression> {
    let pending = declare_lambda(registry, source, path, params, return_type)?;
    define_lambda(registry, pending)
}
