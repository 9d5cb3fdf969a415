//! Procedural fill-in-the-blank equations.
//!
//! An equation is one to three distinct digits joined by one or two
//! operators, followed by `=` and the exact integer result, e.g.
//! `6 / 3 + 4 = 6`. One or two operands are then replaced by blanks.

use fillmath_protocol::{Difficulty, Question, Symbol, Token};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{trace, warn};

use crate::{evaluate, random_token};

/// Draws attempted per difficulty before falling back to an easier one.
pub const MAX_ATTEMPTS: usize = 64;

const QUESTION_ID_LEN: usize = 7;

const ADDITIVE: [Symbol; 2] = [Symbol::Add, Symbol::Sub];
const MULTIPLICATIVE: [Symbol; 2] = [Symbol::Mul, Symbol::Div];
const ALL_OPERATORS: [Symbol; 4] = [Symbol::Add, Symbol::Sub, Symbol::Mul, Symbol::Div];

/// An equation before blanks are cut out.
#[derive(Debug)]
struct Draft {
    operands: Vec<i64>,
    operators: Vec<Symbol>,
    result: i64,
}

impl Draft {
    fn has_multiplicative(&self) -> bool {
        self.operators.iter().any(|op| op.is_multiplicative())
    }

    fn tokens(&self) -> Vec<Token> {
        let mut tokens = Vec::with_capacity(self.operands.len() * 2 + 1);
        for (i, &operand) in self.operands.iter().enumerate() {
            if i > 0 {
                tokens.push(Token::Symbol(self.operators[i - 1]));
            }
            tokens.push(Token::Number(operand));
        }
        tokens
    }
}

/// Generates a question at `difficulty`.
///
/// Each difficulty gets [`MAX_ATTEMPTS`] draws. If none satisfies the
/// constraints the generator moves to the next easier difficulty; an easy
/// draw always succeeds, so this terminates. The returned question's
/// `difficulty` is the level that was actually produced.
pub fn generate_question<R: Rng + ?Sized>(rng: &mut R, difficulty: Difficulty) -> Question {
    let mut level = difficulty;
    let draft = loop {
        if level == Difficulty::Easy {
            break draft_easy(rng);
        }
        if let Some(draft) = (0..MAX_ATTEMPTS).find_map(|_| draw(&mut *rng, level)) {
            break draft;
        }
        let easier = level.easier().unwrap_or(Difficulty::Easy);
        warn!(
            from = %level,
            to = %easier,
            attempts = MAX_ATTEMPTS,
            "equation draws exhausted, falling back"
        );
        level = easier;
    };

    let question = cut_blanks(rng, draft, level);
    trace!(id = %question.id, equation = %question, "generated question");
    question
}

fn draft_easy<R: Rng + ?Sized>(rng: &mut R) -> Draft {
    let operator = *ADDITIVE.choose(rng).unwrap_or(&Symbol::Add);
    let mut digits = Digits::new();
    let a = digits.take_any(rng);
    let b = digits.take_any(rng);
    let result = match operator {
        Symbol::Sub => a - b,
        _ => a + b,
    };
    Draft {
        operands: vec![a, b],
        operators: vec![operator],
        result,
    }
}

/// One draw at `level`. `None` means the draw broke a constraint.
fn draw<R: Rng + ?Sized>(rng: &mut R, level: Difficulty) -> Option<Draft> {
    let count = match level {
        Difficulty::Easy => 1,
        Difficulty::Medium | Difficulty::Hard => rng.random_range(1..=2),
    };

    let mut operators = Vec::with_capacity(count);
    for i in 0..count {
        let pool: &[Symbol] = match level {
            Difficulty::Easy => &ADDITIVE,
            Difficulty::Medium => &ALL_OPERATORS,
            Difficulty::Hard if i == 0 => &MULTIPLICATIVE,
            Difficulty::Hard => &ADDITIVE,
        };
        let op = *pool.choose(rng)?;
        operators.push(op);
        if level == Difficulty::Medium && op.is_multiplicative() {
            break;
        }
    }

    let mut digits = Digits::new();
    let mut operands = Vec::with_capacity(operators.len() + 1);
    let first = digits.take_any(rng);
    operands.push(first);
    // Value of the multiplicative term ending at the last operand.
    let mut term = first;

    for i in 0..operators.len() {
        let operand = if operators[i] == Symbol::Div {
            match digits.take_divisor_of(rng, term) {
                Some(d) => d,
                // Hard must keep its leading multiplicative operator.
                None if level == Difficulty::Hard && i == 0 => return None,
                None => {
                    operators[i] = Symbol::Add;
                    digits.take_any(rng)
                }
            }
        } else {
            digits.take_any(rng)
        };

        term = match operators[i] {
            Symbol::Mul => term * operand,
            Symbol::Div => term / operand,
            _ => operand,
        };
        operands.push(operand);
    }

    if operands.iter().any(|n| !(1..=9).contains(n)) {
        return None;
    }

    let draft = Draft {
        operands,
        operators,
        result: 0,
    };
    let result = evaluate(&draft.tokens()).ok()?.as_integer()?;
    Some(Draft { result, ..draft })
}

/// Replaces one or two operands with blanks and records them in order.
fn cut_blanks<R: Rng + ?Sized>(rng: &mut R, draft: Draft, level: Difficulty) -> Question {
    let blanks = match level {
        Difficulty::Easy => 1,
        Difficulty::Medium if draft.has_multiplicative() => 1,
        Difficulty::Medium => 2,
        Difficulty::Hard => rng.random_range(1..=2),
    }
    .min(draft.operands.len());

    let mut picked = rand::seq::index::sample(rng, draft.operands.len(), blanks).into_vec();
    picked.sort_unstable();

    let mut equation = draft.tokens();
    let mut withheld = Vec::with_capacity(blanks);
    for operand_index in picked {
        // Operands sit at even token positions.
        let position = operand_index * 2;
        if let Token::Number(value) = equation[position] {
            withheld.push(value);
            equation[position] = Token::BLANK;
        }
    }
    equation.push(Token::EQUALS);
    equation.push(Token::Number(draft.result));

    Question::new(random_token(rng, QUESTION_ID_LEN), equation, level, withheld)
}

/// The digits 1–9 not yet used in the current equation.
struct Digits {
    unused: Vec<i64>,
}

impl Digits {
    fn new() -> Self {
        Self {
            unused: (1..=9).collect(),
        }
    }

    fn take_any<R: Rng + ?Sized>(&mut self, rng: &mut R) -> i64 {
        let index = rng.random_range(0..self.unused.len());
        self.unused.swap_remove(index)
    }

    fn take_divisor_of<R: Rng + ?Sized>(&mut self, rng: &mut R, value: i64) -> Option<i64> {
        let candidates: Vec<usize> = self
            .unused
            .iter()
            .enumerate()
            .filter(|&(_, &d)| value % d == 0)
            .map(|(i, _)| i)
            .collect();
        let &index = candidates.choose(rng)?;
        Some(self.unused.swap_remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_digits_never_repeat() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut digits = Digits::new();
        let mut seen: Vec<i64> = (0..9).map(|_| digits.take_any(&mut rng)).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_take_divisor_of_one_when_one_is_used() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut digits = Digits { unused: vec![2, 3, 4] };
        assert_eq!(digits.take_divisor_of(&mut rng, 1), None);
        assert_eq!(digits.take_divisor_of(&mut rng, 9), Some(3));
    }

    #[test]
    fn test_draft_easy_is_single_additive_operator() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let d = draft_easy(&mut rng);
            assert_eq!(d.operators.len(), 1);
            assert!(!d.has_multiplicative());
            assert_ne!(d.operands[0], d.operands[1]);
        }
    }

    #[test]
    fn test_draft_medium_stops_after_multiplicative_operator() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let Some(d) = draw(&mut rng, Difficulty::Medium) else {
                continue;
            };
            if let Some(pos) = d.operators.iter().position(|op| op.is_multiplicative()) {
                assert_eq!(pos, d.operators.len() - 1);
            }
        }
    }

    #[test]
    fn test_draft_hard_leads_with_multiplicative_operator() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            if let Some(d) = draw(&mut rng, Difficulty::Hard) {
                assert!(d.operators[0].is_multiplicative());
                assert!(d.operators[1..].iter().all(|op| !op.is_multiplicative()));
            }
        }
    }

    #[test]
    fn test_cut_blanks_never_blanks_result() {
        let mut rng = StdRng::seed_from_u64(6);
        let draft = Draft {
            operands: vec![4, 5],
            operators: vec![Symbol::Add],
            result: 9,
        };
        let q = cut_blanks(&mut rng, draft, Difficulty::Easy);
        assert_eq!(q.equation.last(), Some(&Token::Number(9)));
        assert_eq!(q.blank_count(), 1);
        assert_eq!(q.withheld().len(), 1);
        assert_eq!(q.id.len(), QUESTION_ID_LEN);
    }
}
