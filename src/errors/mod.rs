//! Error types, diagnostics, and result aliases for the confgen compiler.
//!
//! Configuration-phase problems are [`ValidationError`]s, collected and
//! reported together. Everything that aborts a compilation unit is a variant
//! of [`ConfgenError`], rendered via `miette` diagnostics.

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::config::ConfigPath;

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate().take(a_len + 1) {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate().take(b_len + 1) {
        *val = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] {
                0
            } else {
                1
            };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}

/// Find the best "did you mean?" suggestion from a list of candidates
pub fn find_similar(name: &str, candidates: &[String], max_distance: usize) -> Option<String> {
    let name_lower = name.to_lowercase();
    let mut best_match = None;
    let mut best_distance = usize::MAX;

    for candidate in candidates {
        let candidate_lower = candidate.to_lowercase();
        let distance = levenshtein_distance(&name_lower, &candidate_lower);

        if distance <= max_distance && distance < best_distance {
            best_distance = distance;
            best_match = Some(candidate.clone());
        }
    }

    best_match
}

/// Help text for an unknown name (key, ID, platform) with a suggestion when one is close.
///
/// `what` names the kind of thing in the fallback text, e.g. "options" or "IDs".
pub fn unknown_name_help(name: &str, available: &[String], what: &str) -> String {
    // Longer names allow more typos
    let max_distance = (name.len() / 3).clamp(2, 3);

    if let Some(suggestion) = find_similar(name, available, max_distance) {
        format!("did you mean '{}'?", suggestion)
    } else if available.is_empty() {
        format!("no {} are defined here", what)
    } else if available.len() <= 8 {
        format!("valid {}: {}", what, available.join(", "))
    } else {
        format!("check the name for typos; {} {} are defined", available.len(), what)
    }
}

/// A configuration problem at one path.
///
/// When a nested level reports several problems for one key, they are folded
/// into a single entry for that key and kept as `causes`.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("{path}: {message}")]
#[diagnostic(code(E0201))]
pub struct ValidationError {
    pub path: ConfigPath,
    pub message: String,
    #[help]
    pub help: Option<String>,
    #[related]
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(path: ConfigPath, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
            help: None,
            causes: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Fold the errors of one child into a single entry at `path`.
    ///
    /// A lone error is returned unchanged so its precise path survives.
    pub fn fold(path: ConfigPath, mut errors: Vec<ValidationError>) -> ValidationError {
        if errors.len() == 1 {
            return errors.remove(0);
        }
        ValidationError {
            message: format!("invalid value ({} errors)", errors.len()),
            path,
            help: None,
            causes: errors,
        }
    }

    /// This error and all nested causes, depth first
    pub fn flatten(&self) -> Vec<&ValidationError> {
        let mut out = vec![self];
        for cause in &self.causes {
            out.extend(cause.flatten());
        }
        out
    }
}

/// Main error type for the confgen compiler
#[derive(Error, Debug, Diagnostic)]
pub enum ConfgenError {
    #[error("failed to parse configuration: {message}")]
    #[diagnostic(code(E0101))]
    Parse { message: String },

    #[error("invalid configuration ({count} error{s})")]
    #[diagnostic(code(E0200), help("fix all configuration errors listed below"))]
    Validation {
        count: usize,
        s: String,
        #[related]
        errors: Vec<ValidationError>,
    },

    #[error("undeclared identifier '{name}'")]
    #[diagnostic(code(E0301), help("{help}"))]
    UndeclaredIdentifier {
        name: String,
        component: String,
        help: String,
    },

    #[error("identifier '{name}' is defined twice")]
    #[diagnostic(
        code(E0302),
        help("'{name}' already had a definition when {component} defined it again")
    )]
    DuplicateDefinition { name: String, component: String },

    #[error("invalid lambda: {message}")]
    #[diagnostic(
        code(E0401),
        help("write a plain body, or a header such as: (float x) -> bool followed by a braced body")
    )]
    LambdaSyntax {
        #[source_code]
        src: String,
        #[label("{message}")]
        span: SourceSpan,
        message: String,
    },

    #[error("argument type mismatch at {path}")]
    #[diagnostic(code(E0402), help("{help}"))]
    ArgumentTypeMismatch {
        path: String,
        expected: String,
        found: String,
        help: String,
    },

    #[error("cannot render identifier '{name}'")]
    #[diagnostic(code(E0501), help("{reason} (while generating {component})"))]
    Render {
        name: String,
        component: String,
        reason: String,
    },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl ConfgenError {
    /// Create a Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        ConfgenError::Parse {
            message: message.into(),
        }
    }

    /// Create an Io error
    pub fn io_error(message: impl Into<String>) -> Self {
        ConfgenError::Io {
            message: message.into(),
        }
    }

    /// Wrap the aggregated configuration errors
    pub fn validation(errors: Vec<ValidationError>) -> Self {
        let count = errors.len();
        ConfgenError::Validation {
            count,
            s: if count == 1 { String::new() } else { "s".to_string() },
            errors,
        }
    }

    /// Create an UndeclaredIdentifier error with a suggestion from the declared names
    pub fn undeclared(
        name: impl Into<String>,
        component: impl Into<String>,
        declared: &[String],
    ) -> Self {
        let name = name.into();
        let help = unknown_name_help(&name, declared, "identifiers");
        ConfgenError::UndeclaredIdentifier {
            name,
            component: component.into(),
            help,
        }
    }

    /// Create a DuplicateDefinition error
    pub fn duplicate_definition(name: impl Into<String>, component: impl Into<String>) -> Self {
        ConfgenError::DuplicateDefinition {
            name: name.into(),
            component: component.into(),
        }
    }

    /// Create a LambdaSyntax error pointing at `offset..offset+length` of `src`
    pub fn lambda_syntax(
        src: impl Into<String>,
        offset: usize,
        length: usize,
        message: impl Into<String>,
    ) -> Self {
        ConfgenError::LambdaSyntax {
            src: src.into(),
            span: (offset, length).into(),
            message: message.into(),
        }
    }

    /// Create an ArgumentTypeMismatch error
    pub fn argument_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        let found = found.into();
        let help = format!(
            "this trigger expects a lambda of type {} but it is written as {}",
            expected, found
        );
        ConfgenError::ArgumentTypeMismatch {
            path: path.into(),
            expected,
            found,
            help,
        }
    }

    /// Create a Render error
    pub fn render(
        name: impl Into<String>,
        component: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfgenError::Render {
            name: name.into(),
            component: component.into(),
            reason: reason.into(),
        }
    }

    /// The aggregated configuration errors, if this is a validation failure
    pub fn validation_errors(&self) -> Option<&[ValidationError]> {
        match self {
            ConfgenError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// Result type for confgen operations
pub type ConfgenResult<T> = Result<T, ConfgenError>;
