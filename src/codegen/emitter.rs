//! Emitters for generated programs
//!
//! Turns a finished [`Program`] into either the bare setup fragment or a
//! complete `main.cpp`.

use super::statement::{indent, Statement, INDENT};
use crate::compiler::Program;
use crate::errors::{ConfgenError, ConfgenResult};
use crate::registry::IdRegistry;

const CODE_BEGIN: &str = "// ========== AUTO GENERATED CODE BEGIN ===========";
const CODE_END: &str = "// =========== AUTO GENERATED CODE END ============";

/// What to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Setup statements only
    Fragment,
    /// A complete translation unit
    MainCpp,
}

impl OutputKind {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fragment" | "setup" => Some(OutputKind::Fragment),
            "main" | "main.cpp" | "main-cpp" | "cpp" => Some(OutputKind::MainCpp),
            _ => None,
        }
    }
}

/// Trait for program emitters
pub trait Emitter {
    /// Emit a program to string
    fn emit(&self, program: &Program) -> ConfgenResult<String>;

    /// Emit a program to a writer
    fn emit_to_writer<W: std::io::Write>(&self, program: &Program, writer: &mut W) -> ConfgenResult<()> {
        let output = self.emit(program)?;
        writer
            .write_all(output.as_bytes())
            .map_err(|e| ConfgenError::io_error(e.to_string()))
    }
}

/// Render statements one per line, in order
pub fn render_statements(statements: &[Statement], registry: &IdRegistry) -> ConfgenResult<String> {
    let mut out = String::new();
    for statement in statements {
        out.push_str(&statement.render(registry)?);
        out.push('\n');
    }
    Ok(out)
}

/// Global declarations for all pointer statements
pub fn render_globals(statements: &[Statement], registry: &IdRegistry) -> Vec<String> {
    statements
        .iter()
        .filter_map(|s| s.global_declaration(registry))
        .collect()
}

/// Emits the ordered setup statements
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentEmitter;

impl FragmentEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl Emitter for FragmentEmitter {
    fn emit(&self, program: &Program) -> ConfgenResult<String> {
        render_statements(program.statements(), program.registry())
    }
}

/// Emits a complete `main.cpp` around the setup statements
#[derive(Debug, Clone, Copy, Default)]
pub struct MainCppEmitter;

impl MainCppEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl Emitter for MainCppEmitter {
    fn emit(&self, program: &Program) -> ConfgenResult<String> {
        let fragment = render_statements(program.statements(), program.registry())?;
        let globals = render_globals(program.statements(), program.registry());

        let mut out = String::new();
        out.push_str("// Auto generated code by confgen\n");
        out.push_str("#include \"esphomelib/application.h\"\n");
        for include in &program.metadata().include_directives {
            out.push_str(include);
            out.push('\n');
        }
        out.push('\n');
        out.push_str("using namespace esphomelib;\n");
        if !globals.is_empty() {
            out.push('\n');
            for global in globals {
                out.push_str(&global);
                out.push('\n');
            }
        }
        out.push('\n');
        out.push_str("void setup() {\n");
        out.push_str(INDENT);
        out.push_str("// ===== DO NOT EDIT ANYTHING BELOW THIS LINE =====\n");
        out.push_str(INDENT);
        out.push_str(CODE_BEGIN);
        out.push('\n');
        out.push_str(&indent(&fragment, INDENT));
        out.push_str(INDENT);
        out.push_str(CODE_END);
        out.push('\n');
        out.push_str(INDENT);
        out.push_str("// ========= YOU CAN EDIT AFTER THIS LINE =========\n");
        out.push_str(INDENT);
        out.push_str("App.setup();\n");
        out.push_str("}\n\n");
        out.push_str("void loop() {\n");
        out.push_str(INDENT);
        out.push_str("App.loop();\n");
        out.push_str(INDENT);
        out.push_str("delay(16);\n");
        out.push_str("}\n");
        Ok(out)
    }
}

/// Emit a program in the given form
pub fn emit(program: &Program, kind: OutputKind) -> ConfgenResult<String> {
    match kind {
        OutputKind::Fragment => FragmentEmitter::new().emit(program),
        OutputKind::MainCpp => MainCppEmitter::new().emit(program),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_kind_parse() {
        assert_eq!(OutputKind::parse("fragment"), Some(OutputKind::Fragment));
        assert_eq!(OutputKind::parse("MAIN.CPP"), Some(OutputKind::MainCpp));
        assert_eq!(OutputKind::parse("json"), None);
    }
}
