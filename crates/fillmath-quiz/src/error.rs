//! Error types for equation evaluation.

/// Errors raised while evaluating an equation.
///
/// [`check_answer`](crate::check_answer) only returns these when the
/// equation itself is at fault, so callers treat them as internal faults
/// rather than as a wrong answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivisionByZero,

    /// An intermediate value left the `i64` range.
    #[error("arithmetic overflow")]
    Overflow,

    /// The token sequence is not an expression: dangling operator,
    /// missing `=`, unfilled blank, and so on.
    #[error("malformed equation: {0}")]
    Malformed(&'static str),
}
