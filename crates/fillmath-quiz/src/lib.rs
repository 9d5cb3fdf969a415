//! Equation puzzles for Fillmath.
//!
//! - [`generate_question`] builds a random fill-in-the-blank equation for a
//!   [`Difficulty`](fillmath_protocol::Difficulty).
//! - [`check_answer`] fills a player's numbers into the blanks and decides
//!   whether both sides of the equation agree.
//!
//! Both sides share one exact evaluator ([`evaluate`]) so a generated
//! question and its verification can never disagree about precedence or
//! rounding.

mod arith;
mod error;
mod generator;
mod token;
mod verifier;

pub use arith::{evaluate, Ratio};
pub use error::EvalError;
pub use generator::{generate_question, MAX_ATTEMPTS};
pub use token::random_token;
pub use verifier::{check_answer, verify};
