//! Target-language code model: expressions, statements, and emitters

pub mod emitter;
pub mod expression;
pub mod statement;

pub use emitter::{emit, Emitter, FragmentEmitter, MainCppEmitter, OutputKind};
pub use expression::{
    cpp_string_escape, ExprKind, Expression, LambdaExpression, Literal, Parameter,
};
pub use statement::{indent_all_but_first_and_last, Statement};
