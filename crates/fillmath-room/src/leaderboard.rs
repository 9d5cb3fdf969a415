//! End-of-game ranking.

use std::cmp::Reverse;

use fillmath_protocol::{LeaderboardEntry, Player};

/// Ranks `players` (given in join order) and picks the winner.
///
/// Survivors come first, then eliminated players with the most recently
/// eliminated ranked highest. Eliminations in the same millisecond fall
/// back to their elimination sequence, then to join order. There is no
/// winner when every player has the same score.
pub fn compute_leaderboard(players: &[Player]) -> (Vec<LeaderboardEntry>, Option<LeaderboardEntry>) {
    let mut order: Vec<(usize, &Player)> = players.iter().enumerate().collect();
    order.sort_by_key(|(joined, p)| {
        (
            p.elimination_time.is_some(),
            Reverse(p.elimination_time),
            Reverse(p.elimination_seq),
            *joined,
        )
    });

    let leaderboard: Vec<LeaderboardEntry> = order
        .into_iter()
        .zip(1u32..)
        .map(|((_, p), rank)| LeaderboardEntry {
            player_id: p.id,
            username: p.username.clone(),
            score: p.score,
            rank,
        })
        .collect();

    let all_tied = leaderboard
        .first()
        .is_none_or(|top| leaderboard.iter().all(|e| e.score == top.score));
    let winner = if all_tied {
        None
    } else {
        leaderboard.first().cloned()
    };
    (leaderboard, winner)
}
