//! Property checks for generated questions.
//!
//! Every test sweeps a range of seeds so a regression shows up as a
//! reproducible seed in the failure message.

use fillmath_protocol::{Difficulty, Question, Symbol, Token};
use fillmath_quiz::{check_answer, generate_question, verify};
use rand::SeedableRng;
use rand::rngs::StdRng;

const SEEDS: u64 = 500;

// =========================================================================
// Helpers
// =========================================================================

fn generate(seed: u64, difficulty: Difficulty) -> Question {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_question(&mut rng, difficulty)
}

fn operators(q: &Question) -> Vec<Symbol> {
    q.equation
        .iter()
        .filter_map(|t| match t {
            Token::Symbol(s) if s.is_operator() => Some(*s),
            _ => None,
        })
        .collect()
}

fn visible_operands(q: &Question) -> Vec<i64> {
    let eq = &q.equation[..q.equation.len() - 2];
    eq.iter()
        .filter_map(|t| match t {
            Token::Number(n) => Some(*n),
            _ => None,
        })
        .collect()
}

// =========================================================================
// Solvability
// =========================================================================

#[test]
fn test_withheld_values_solve_every_generated_question() {
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        for seed in 0..SEEDS {
            let q = generate(seed, difficulty);
            assert_eq!(
                verify(&q, q.withheld()),
                Ok(true),
                "seed {seed} {difficulty}: {q} with {:?}",
                q.withheld()
            );
        }
    }
}

#[test]
fn test_result_is_never_blank() {
    for seed in 0..SEEDS {
        let q = generate(seed, Difficulty::Hard);
        let n = q.equation.len();
        assert_eq!(q.equation[n - 2], Token::EQUALS, "seed {seed}: {q}");
        assert!(matches!(q.equation[n - 1], Token::Number(_)), "seed {seed}: {q}");
    }
}

#[test]
fn test_operands_are_distinct_digits() {
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        for seed in 0..SEEDS {
            let q = generate(seed, difficulty);
            let mut all: Vec<i64> = visible_operands(&q);
            all.extend_from_slice(q.withheld());
            assert!(all.iter().all(|n| (1..=9).contains(n)), "seed {seed}: {q}");
            let before = all.len();
            all.sort_unstable();
            all.dedup();
            assert_eq!(all.len(), before, "seed {seed}: duplicate operand in {q}");
        }
    }
}

// =========================================================================
// Difficulty rules
// =========================================================================

#[test]
fn test_easy_has_one_additive_operator_and_one_blank() {
    for seed in 0..SEEDS {
        let q = generate(seed, Difficulty::Easy);
        let ops = operators(&q);
        assert_eq!(ops.len(), 1, "seed {seed}: {q}");
        assert!(!ops[0].is_multiplicative(), "seed {seed}: {q}");
        assert_eq!(q.blank_count(), 1, "seed {seed}: {q}");
    }
}

#[test]
fn test_medium_blank_count_follows_operator_mix() {
    for seed in 0..SEEDS {
        let q = generate(seed, Difficulty::Medium);
        let ops = operators(&q);
        assert!((1..=2).contains(&ops.len()), "seed {seed}: {q}");
        if ops.iter().any(|op| op.is_multiplicative()) {
            assert_eq!(q.blank_count(), 1, "seed {seed}: {q}");
        } else {
            assert_eq!(q.blank_count(), 2, "seed {seed}: {q}");
        }
    }
}

#[test]
fn test_hard_leads_with_multiplicative_operator() {
    for seed in 0..SEEDS {
        let q = generate(seed, Difficulty::Hard);
        if q.difficulty != Difficulty::Hard {
            continue;
        }
        let ops = operators(&q);
        assert!(ops[0].is_multiplicative(), "seed {seed}: {q}");
        assert!((1..=2).contains(&q.blank_count()), "seed {seed}: {q}");
    }
}

#[test]
fn test_blank_count_matches_withheld_count() {
    for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
        for seed in 0..SEEDS {
            let q = generate(seed, difficulty);
            assert_eq!(q.blank_count(), q.withheld().len(), "seed {seed}: {q}");
        }
    }
}

// =========================================================================
// Verification against generated questions
// =========================================================================

#[test]
fn test_wrong_count_answer_is_rejected() {
    for seed in 0..50 {
        let q = generate(seed, Difficulty::Medium);
        let mut answer = q.withheld().to_vec();
        answer.push(1);
        assert_eq!(check_answer(&q.equation, &answer), Ok(false));
        assert_eq!(check_answer(&q.equation, &[]), Ok(false));
    }
}
