//! Answer verification.

use fillmath_protocol::{Question, Token};

use crate::{evaluate, EvalError};

/// Fills `answer` into the blanks of `equation` (left to right) and checks
/// that both sides of the `=` evaluate to the same value.
///
/// A wrong number of answers is an ordinary incorrect answer (`Ok(false)`),
/// as is an empty answer. So is a filled value that makes the arithmetic
/// fail, such as `0` after a `÷` or a number large enough to overflow.
/// `Err` means the equation itself could not be evaluated.
pub fn check_answer(equation: &[Token], answer: &[i64]) -> Result<bool, EvalError> {
    let blanks = equation.iter().filter(|t| t.is_blank()).count();
    if answer.is_empty() || answer.len() != blanks {
        return Ok(false);
    }

    match sides_agree(&fill(equation, answer.iter().copied())) {
        Err(EvalError::DivisionByZero | EvalError::Overflow) => {
            // Blanks hold a single operand each, so with every blank set to
            // 1 the arithmetic can only fail on the equation's own numbers.
            sides_agree(&fill(equation, std::iter::repeat(1)))?;
            Ok(false)
        }
        outcome => outcome,
    }
}

fn fill(equation: &[Token], mut values: impl Iterator<Item = i64>) -> Vec<Token> {
    equation
        .iter()
        .map(|token| match token {
            t if t.is_blank() => values.next().map_or(*t, Token::Number),
            t => *t,
        })
        .collect()
}

fn sides_agree(filled: &[Token]) -> Result<bool, EvalError> {
    let equals = filled
        .iter()
        .position(|t| *t == Token::EQUALS)
        .ok_or(EvalError::Malformed("missing '='"))?;
    let left = evaluate(&filled[..equals])?;
    let right = evaluate(&filled[equals + 1..])?;
    Ok(left == right)
}

/// [`check_answer`] against a question's equation.
pub fn verify(question: &Question, answer: &[i64]) -> Result<bool, EvalError> {
    check_answer(&question.equation, answer)
}
