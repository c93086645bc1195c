pub mod net;
pub mod player;
pub mod question;
pub mod room;
pub mod shuffle;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{Player, PlayerId};
    use crate::question::{OPTION_COUNT, Question, QuestionBank};

    /// Create `n` test players with sequential IDs starting at 1; the
    /// first one is the host.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player::new(i as PlayerId + 1, format!("Player{}", i + 1), i == 0))
            .collect()
    }

    /// A small bank where every question's correct answer is the literal
    /// text "right", so tests can locate it after shuffling.
    pub fn marked_bank(count: usize) -> QuestionBank {
        let questions = (0..count)
            .map(|i| {
                let mut options = vec!["right".to_string()];
                options.extend((1..OPTION_COUNT).map(|j| format!("wrong{j}")));
                Question {
                    prompt: format!("Question {i}"),
                    options,
                    correct: 0,
                }
            })
            .collect();
        QuestionBank::new(questions).expect("marked bank is valid")
    }
}
