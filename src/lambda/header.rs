// Lambda header parser
//
// An embedded lambda is either a plain body, or a header followed by a braced
// body:
//
//     (float x, const char *name) -> bool { return x > 0.5f; }
//
// The header is only recognized when the text starts with `(` and the
// matching `)` is followed by `->` or `{`.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::codegen::Parameter;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::TypeTag;

/// The signature written in a lambda header
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaHeader {
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeTag>,
}

/// A lambda split into its optional header and its body lines
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLambda {
    pub header: Option<LambdaHeader>,
    pub body: String,
}

/// Parse embedded lambda source
pub fn parse_lambda(source: &str) -> ConfgenResult<ParsedLambda> {
    let start = source.len() - source.trim_start().len();
    let rest = &source[start..];

    if !rest.starts_with('(') {
        check_balance(source, source, 0)?;
        return Ok(ParsedLambda {
            header: None,
            body: dedent(source),
        });
    }

    let close = matching_paren(source, start)?;
    let after = close + 1;
    let tail = source[after..].trim_start();
    let tail_start = source.len() - tail.len();

    let (return_type, open_brace) = if let Some(ret) = tail.strip_prefix("->") {
        let ret_start = tail_start + 2;
        let brace = ret.find('{').map(|i| ret_start + i).ok_or_else(|| {
            ConfgenError::lambda_syntax(source, ret_start, ret.len(), "expected '{' after return type")
        })?;
        let ret_text = &source[ret_start..brace];
        let trimmed = ret_text.trim();
        if trimmed.is_empty() {
            return Err(ConfgenError::lambda_syntax(
                source,
                tail_start,
                2,
                "missing return type after '->'",
            ));
        }
        let offset = ret_start + (ret_text.len() - ret_text.trim_start().len());
        let ty = TypeTag::parse(trimmed).ok_or_else(|| {
            ConfgenError::lambda_syntax(
                source,
                offset,
                trimmed.len(),
                format!("unknown return type '{}'", trimmed),
            )
        })?;
        (Some(ty), brace)
    } else if tail.starts_with('{') {
        (None, tail_start)
    } else {
        // Parenthesized expression, not a header
        check_balance(source, source, 0)?;
        return Ok(ParsedLambda {
            header: None,
            body: dedent(source),
        });
    };

    let close_brace = source.rfind('}').filter(|i| *i > open_brace).ok_or_else(|| {
        ConfgenError::lambda_syntax(source, open_brace, 1, "lambda body is never closed")
    })?;
    let trailing = &source[close_brace + 1..];
    if !trailing.trim().is_empty() {
        let offset = close_brace + 1 + (trailing.len() - trailing.trim_start().len());
        return Err(ConfgenError::lambda_syntax(
            source,
            offset,
            trailing.trim().len(),
            "unexpected text after lambda body",
        ));
    }

    let params = parse_params(source, start + 1, close)?;
    let body = &source[open_brace + 1..close_brace];
    check_balance(source, body, open_brace + 1)?;

    Ok(ParsedLambda {
        header: Some(LambdaHeader {
            params,
            return_type,
        }),
        body: dedent(body),
    })
}

/// Index of the `)` matching the `(` at `open`.
///
/// Parentheses inside string and character literals and line comments do not count.
fn matching_paren(source: &str, open: usize) -> ConfgenResult<usize> {
    let mut depth = 0usize;
    let mut chars = source[open..].char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' | '\'' => skip_literal(&mut chars, ch),
            '/' if matches!(chars.peek(), Some((_, '/'))) => skip_line_comment(&mut chars),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + i);
                }
            }
            _ => {}
        }
    }
    Err(ConfgenError::lambda_syntax(
        source,
        open,
        1,
        "unbalanced '(' in lambda header",
    ))
}

/// Consume a string or character literal up to its closing `quote`
fn skip_literal(chars: &mut Peekable<CharIndices<'_>>, quote: char) {
    let mut escaped = false;
    for (_, c) in chars.by_ref() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            break;
        }
    }
}

fn skip_line_comment(chars: &mut Peekable<CharIndices<'_>>) {
    for (_, c) in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn parse_params(source: &str, from: usize, to: usize) -> ConfgenResult<Vec<Parameter>> {
    let list = &source[from..to];
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut params: Vec<Parameter> = Vec::new();
    let mut depth = 0i32;
    let mut piece_start = 0;
    let mut pieces = Vec::new();
    for (i, ch) in list.char_indices() {
        match ch {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            ',' if depth == 0 => {
                pieces.push((piece_start, &list[piece_start..i]));
                piece_start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push((piece_start, &list[piece_start..]));

    for (rel, piece) in pieces {
        let offset = from + rel;
        let trimmed = piece.trim();
        let lead = piece.len() - piece.trim_start().len();
        if trimmed.is_empty() {
            return Err(ConfgenError::lambda_syntax(
                source,
                offset,
                piece.len().max(1),
                "empty parameter",
            ));
        }

        let name_len = trimmed
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .count();
        let split = trimmed.len() - name_len;
        let name = &trimmed[split..];
        let ty_text = trimmed[..split].trim();
        let name_offset = offset + lead + split;

        if name.is_empty() {
            return Err(ConfgenError::lambda_syntax(
                source,
                offset + lead,
                trimmed.len(),
                "expected a parameter name after the type",
            ));
        }
        if ty_text.is_empty() {
            return Err(ConfgenError::lambda_syntax(
                source,
                name_offset,
                name.len(),
                format!("parameter '{}' has no type", name),
            ));
        }
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(ConfgenError::lambda_syntax(
                source,
                name_offset,
                name.len(),
                format!("'{}' is not a valid parameter name", name),
            ));
        }
        let ty = TypeTag::parse(ty_text).ok_or_else(|| {
            ConfgenError::lambda_syntax(
                source,
                offset + lead,
                ty_text.len(),
                format!("unknown parameter type '{}'", ty_text),
            )
        })?;
        if params.iter().any(|p| p.name == name) {
            return Err(ConfgenError::lambda_syntax(
                source,
                name_offset,
                name.len(),
                format!("duplicate parameter name '{}'", name),
            ));
        }
        params.push(Parameter::new(name, ty));
    }
    Ok(params)
}

/// Check bracket balance in `text`, which starts at `offset` in `source`.
///
/// String and character literals and line comments are skipped.
fn check_balance(source: &str, text: &str, offset: usize) -> ConfgenResult<()> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '"' | '\'' => skip_literal(&mut chars, ch),
            '/' if matches!(chars.peek(), Some((_, '/'))) => skip_line_comment(&mut chars),
            '(' | '[' | '{' => stack.push((ch, i)),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => {
                        return Err(ConfgenError::lambda_syntax(
                            source,
                            offset + i,
                            1,
                            format!("unbalanced '{}'", ch),
                        ))
                    }
                }
            }
            _ => {}
        }
    }
    if let Some((open, i)) = stack.pop() {
        return Err(ConfgenError::lambda_syntax(
            source,
            offset + i,
            1,
            format!("unbalanced '{}'", open),
        ));
    }
    Ok(())
}

/// Drop surrounding blank lines and the common indentation
fn dedent(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    let (first, last) = match (first, last) {
        (Some(f), Some(l)) => (f, l),
        _ => return String::new(),
    };
    let lines = &lines[first..=last];
    let common = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(common..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::cpp;

    fn syntax_message(result: ConfgenResult<ParsedLambda>) -> String {
        match result {
            Err(ConfgenError::LambdaSyntax { message, .. }) => message,
            other => panic!("expected lambda syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_plain_body() {
        let parsed = parse_lambda("return id(relay).state;\n").unwrap();
        assert!(parsed.header.is_none());
        assert_eq!(parsed.body, "return id(relay).state;");
    }

    #[test]
    fn test_header_with_return_type() {
        let parsed = parse_lambda("(float x, const char *name) -> bool { return x > 0.5f; }").unwrap();
        let header = parsed.header.unwrap();
        assert_eq!(header.params.len(), 2);
        assert_eq!(header.params[0], Parameter::new("x", cpp::float()));
        assert_eq!(header.params[1], Parameter::new("name", cpp::const_char_ptr()));
        assert_eq!(header.return_type, Some(cpp::bool_()));
        assert_eq!(parsed.body, "return x > 0.5f;");
    }

    #[test]
    fn test_header_without_return_type_multiline() {
        let parsed = parse_lambda("() {\n    int a = 1;\n    if (a) {\n      a++;\n    }\n}\n").unwrap();
        let header = parsed.header.unwrap();
        assert!(header.params.is_empty());
        assert!(header.return_type.is_none());
        assert_eq!(parsed.body, "int a = 1;\nif (a) {\n  a++;\n}");
    }

    #[test]
    fn test_parenthesized_expression_is_not_a_header() {
        let parsed = parse_lambda("(id(a).state && id(b).state);").unwrap();
        assert!(parsed.header.is_none());
    }

    #[test]
    fn test_parens_in_literals_do_not_close_expression() {
        let source = r#"("(" + std::string(")")).size();"#;
        let parsed = parse_lambda(source).unwrap();
        assert!(parsed.header.is_none());
        assert_eq!(parsed.body, source);

        let parsed = parse_lambda("(')') == c;").unwrap();
        assert!(parsed.header.is_none());
    }

    #[test]
    fn test_unknown_type_has_span() {
        let err = parse_lambda("(flaot x) -> bool { return true; }").unwrap_err();
        match err {
            ConfgenError::LambdaSyntax { span, message, .. } => {
                assert_eq!(message, "unknown parameter type 'flaot'");
                assert_eq!(span.offset(), 1);
                assert_eq!(span.len(), 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_header_errors() {
        assert_eq!(
            syntax_message(parse_lambda("(float x, float x) { }")),
            "duplicate parameter name 'x'"
        );
        assert_eq!(
            syntax_message(parse_lambda("(float) { }")),
            "parameter 'float' has no type"
        );
        assert_eq!(
            syntax_message(parse_lambda("(float 1x) { }")),
            "'1x' is not a valid parameter name"
        );
        assert_eq!(
            syntax_message(parse_lambda("(float x, ) { }")),
            "empty parameter"
        );
        assert_eq!(
            syntax_message(parse_lambda("(float x -> bool { }")),
            "unbalanced '(' in lambda header"
        );
        assert_eq!(
            syntax_message(parse_lambda("(float x) -> bool { return x; } extra")),
            "unexpected text after lambda body"
        );
    }

    #[test]
    fn test_unbalanced_body() {
        assert_eq!(
            syntax_message(parse_lambda("if (x) { return;")),
            "unbalanced '{'"
        );
        // Brackets inside literals and comments do not count
        assert!(parse_lambda("ESP_LOGD(\"tag\", \"}\"); // )").is_ok());
    }
}
