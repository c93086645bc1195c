use serde::{Deserialize, Serialize};

/// Connection-scoped player identity, allocated by the room registry.
pub type PlayerId = u32;

/// A player inside a trivia room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub score: u32,
    pub correct_count: u32,
    pub is_host: bool,
}

impl Player {
    pub fn new(id: PlayerId, display_name: String, is_host: bool) -> Self {
        Self {
            id,
            display_name,
            score: 0,
            correct_count: 0,
            is_host,
        }
    }
}

/// One row of the final leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub name: String,
    pub score: u32,
    pub correct_count: u32,
    /// Percentage of questions answered correctly, rounded to the nearest integer.
    pub accuracy: u32,
}

/// Compute the final ranking: score descending, correct-count descending,
/// then join order. The input slice must be in join order; the sort is
/// stable, so equal players keep their relative positions.
pub fn rank_players(players: &[Player], question_count: usize) -> Vec<RankingEntry> {
    let mut ranked: Vec<&Player> = players.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(b.correct_count.cmp(&a.correct_count))
    });
    ranked
        .into_iter()
        .map(|p| RankingEntry {
            name: p.display_name.clone(),
            score: p.score,
            correct_count: p.correct_count,
            accuracy: accuracy_percent(p.correct_count, question_count),
        })
        .collect()
}

fn accuracy_percent(correct: u32, question_count: usize) -> u32 {
    if question_count == 0 {
        return 0;
    }
    (f64::from(correct) * 100.0 / question_count as f64).round() as u32
}
