//! Exact rational arithmetic and the expression evaluator.

use fillmath_protocol::{Symbol, Token};

use crate::EvalError;

/// A reduced fraction with a positive denominator.
///
/// Equations only ever hold small integers, but `7 / 2 * 2 = 7` must not
/// be lost to integer truncation, so every intermediate value is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    num: i64,
    den: i64,
}

impl Ratio {
    pub fn integer(n: i64) -> Self {
        Self { num: n, den: 1 }
    }

    /// Builds `num / den` in lowest terms.
    pub fn new(num: i64, den: i64) -> Result<Self, EvalError> {
        if den == 0 {
            return Err(EvalError::DivisionByZero);
        }
        let (mut num, mut den) = (num, den);
        if den < 0 {
            num = num.checked_neg().ok_or(EvalError::Overflow)?;
            den = den.checked_neg().ok_or(EvalError::Overflow)?;
        }
        let g = gcd(num.unsigned_abs(), den.unsigned_abs());
        let g = i64::try_from(g).map_err(|_| EvalError::Overflow)?;
        Ok(Self {
            num: num / g,
            den: den / g,
        })
    }

    /// The value as an integer, if it is one.
    pub fn as_integer(self) -> Option<i64> {
        (self.den == 1).then_some(self.num)
    }

    pub fn checked_add(self, rhs: Ratio) -> Result<Ratio, EvalError> {
        let num = mul(self.num, rhs.den)?
            .checked_add(mul(rhs.num, self.den)?)
            .ok_or(EvalError::Overflow)?;
        Ratio::new(num, mul(self.den, rhs.den)?)
    }

    pub fn checked_sub(self, rhs: Ratio) -> Result<Ratio, EvalError> {
        let neg = Ratio {
            num: rhs.num.checked_neg().ok_or(EvalError::Overflow)?,
            den: rhs.den,
        };
        self.checked_add(neg)
    }

    pub fn checked_mul(self, rhs: Ratio) -> Result<Ratio, EvalError> {
        Ratio::new(mul(self.num, rhs.num)?, mul(self.den, rhs.den)?)
    }

    pub fn checked_div(self, rhs: Ratio) -> Result<Ratio, EvalError> {
        if rhs.num == 0 {
            return Err(EvalError::DivisionByZero);
        }
        Ratio::new(mul(self.num, rhs.den)?, mul(self.den, rhs.num)?)
    }
}

fn mul(a: i64, b: i64) -> Result<i64, EvalError> {
    a.checked_mul(b).ok_or(EvalError::Overflow)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

fn precedence(op: Symbol) -> u8 {
    if op.is_multiplicative() { 2 } else { 1 }
}

fn apply(op: Symbol, lhs: Ratio, rhs: Ratio) -> Result<Ratio, EvalError> {
    match op {
        Symbol::Add => lhs.checked_add(rhs),
        Symbol::Sub => lhs.checked_sub(rhs),
        Symbol::Mul => lhs.checked_mul(rhs),
        Symbol::Div => lhs.checked_div(rhs),
        Symbol::Equals | Symbol::Blank => Err(EvalError::Malformed("not an operator")),
    }
}

fn reduce(values: &mut Vec<Ratio>, op: Symbol) -> Result<(), EvalError> {
    let (Some(rhs), Some(lhs)) = (values.pop(), values.pop()) else {
        return Err(EvalError::Malformed("operator is missing an operand"));
    };
    values.push(apply(op, lhs, rhs)?);
    Ok(())
}

/// Evaluates one side of an equation.
///
/// Operand/operator stack reduction with two precedence tiers: `*` and
/// `/` bind tighter than `+` and `-`, and equal tiers associate left.
/// The slice must contain only numbers and the four operators.
pub fn evaluate(tokens: &[Token]) -> Result<Ratio, EvalError> {
    let mut values: Vec<Ratio> = Vec::with_capacity(tokens.len() / 2 + 1);
    let mut operators: Vec<Symbol> = Vec::with_capacity(tokens.len() / 2);
    let mut expect_operand = true;

    for token in tokens {
        match *token {
            Token::Number(n) => {
                if !expect_operand {
                    return Err(EvalError::Malformed("two operands in a row"));
                }
                values.push(Ratio::integer(n));
                expect_operand = false;
            }
            Token::Symbol(op) if op.is_operator() => {
                if expect_operand {
                    return Err(EvalError::Malformed("operator without a left operand"));
                }
                while let Some(&top) = operators.last() {
                    if precedence(top) < precedence(op) {
                        break;
                    }
                    operators.pop();
                    reduce(&mut values, top)?;
                }
                operators.push(op);
                expect_operand = true;
            }
            Token::Symbol(Symbol::Blank) => {
                return Err(EvalError::Malformed("unfilled blank"));
            }
            Token::Symbol(_) => {
                return Err(EvalError::Malformed("unexpected '='"));
            }
        }
    }

    if expect_operand {
        return Err(EvalError::Malformed("expression ends without an operand"));
    }
    while let Some(op) = operators.pop() {
        reduce(&mut values, op)?;
    }
    values
        .pop()
        .ok_or(EvalError::Malformed("empty expression"))
}
