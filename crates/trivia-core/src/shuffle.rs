use rand::Rng;

use crate::question::Question;

/// A question prepared for one round: the same option texts in a random
/// presentation order, with the correct index recomputed to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

/// Produce a randomized presentation order for a question's options.
///
/// Shuffles an index permutation with Fisher–Yates (every permutation
/// equally likely) and maps the original correct index through it, so the
/// option multiset is unchanged and exactly one index stays correct.
pub fn shuffle_question<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> RoundQuestion {
    let n = question.options.len();
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.random_range(0..=i);
        indices.swap(i, j);
    }
    let options: Vec<String> = indices
        .iter()
        .map(|&i| question.options[i].clone())
        .collect();
    let correct_index = indices
        .iter()
        .position(|&i| i == question.correct)
        .unwrap_or(question.correct);
    RoundQuestion {
        prompt: question.prompt.clone(),
        options,
        correct_index,
    }
}
