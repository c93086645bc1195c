use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed number of answer options per question.
pub const OPTION_COUNT: usize = 4;

/// An immutable question record. `correct` indexes into `options` in the
/// original, unshuffled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct: usize,
}

#[derive(Debug)]
pub enum BankError {
    Io(std::io::Error),
    Parse(String),
    EmptyBank,
    EmptyPrompt(usize),
    WrongArity { index: usize, found: usize },
    CorrectOutOfRange { index: usize, correct: usize },
}

impl std::fmt::Display for BankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read question file: {e}"),
            Self::Parse(e) => write!(f, "failed to parse question file: {e}"),
            Self::EmptyBank => write!(f, "question bank contains no questions"),
            Self::EmptyPrompt(i) => write!(f, "question {i} has an empty prompt"),
            Self::WrongArity { index, found } => {
                write!(
                    f,
                    "question {index} has {found} options (expected {OPTION_COUNT})"
                )
            },
            Self::CorrectOutOfRange { index, correct } => {
                write!(f, "question {index} correct index {correct} out of range")
            },
        }
    }
}

impl std::error::Error for BankError {}

#[derive(Deserialize)]
struct BankFile {
    questions: Vec<Question>,
}

/// An immutable, ordered collection of questions. Built once at startup
/// and shared read-only across all rooms.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Result<Self, BankError> {
        if questions.is_empty() {
            return Err(BankError::EmptyBank);
        }
        for (index, q) in questions.iter().enumerate() {
            if q.prompt.trim().is_empty() {
                return Err(BankError::EmptyPrompt(index));
            }
            if q.options.len() != OPTION_COUNT {
                return Err(BankError::WrongArity {
                    index,
                    found: q.options.len(),
                });
            }
            if q.correct >= q.options.len() {
                return Err(BankError::CorrectOutOfRange {
                    index,
                    correct: q.correct,
                });
            }
        }
        Ok(Self { questions })
    }

    /// Parse a bank from TOML (`[[questions]]` tables with `prompt`,
    /// `options`, and `correct` fields).
    pub fn from_toml_str(content: &str) -> Result<Self, BankError> {
        let file: BankFile =
            toml::from_str(content).map_err(|e| BankError::Parse(e.to_string()))?;
        Self::new(file.questions)
    }

    /// Load a bank from a TOML file on disk.
    pub fn load(path: &str) -> Result<Self, BankError> {
        let content = std::fs::read_to_string(path).map_err(BankError::Io)?;
        Self::from_toml_str(&content)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Draw a random subset of `count` questions. The subset and its order
    /// are fixed for one session. Uses a partial Fisher–Yates over an index
    /// permutation so every subset and ordering is equally likely. Asking
    /// for more questions than the bank holds returns the whole bank,
    /// shuffled.
    pub fn pick<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Question> {
        let n = self.questions.len();
        let count = count.min(n);
        let mut indices: Vec<usize> = (0..n).collect();
        for i in 0..count {
            let j = rng.random_range(i..n);
            indices.swap(i, j);
        }
        indices[..count]
            .iter()
            .map(|&i| self.questions[i].clone())
            .collect()
    }
}

impl Default for QuestionBank {
    /// The built-in question set on narrative texts, shipped so the server
    /// runs without any question file.
    fn default() -> Self {
        let q = |prompt: &str, options: [&str; OPTION_COUNT]| Question {
            prompt: prompt.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct: 0,
        };
        let questions = vec![
            q(
                "What is a narration?",
                [
                    "A text that tells a story with characters and time",
                    "A text that describes objects or places",
                    "A text that argues for an opinion",
                    "A text that explains a concept",
                ],
            ),
            q(
                "What is the main element of a narration?",
                ["The narrator", "The author", "The title", "The theme"],
            ),
            q(
                "What is the plot?",
                [
                    "The sequence of actions and events in the story",
                    "The space where the story takes place",
                    "The characters' conflict",
                    "The characters' dialogue",
                ],
            ),
            q(
                "Who tells the story in a narrative text?",
                ["The narrator", "The protagonist", "The author", "The reader"],
            ),
            q(
                "Which of these is a type of narrator?",
                [
                    "Character narrator",
                    "Illustrator narrator",
                    "Public narrator",
                    "Anonymous narrator",
                ],
            ),
            q(
                "What is the climax of a narrative?",
                [
                    "The moment of greatest tension in the story",
                    "The beginning of the story",
                    "The conclusion of the story",
                    "The description of the setting",
                ],
            ),
            q(
                "What does the resolution represent?",
                [
                    "The final part where the conflict is resolved",
                    "The start of the story",
                    "The central conflict",
                    "The characters' dialogue",
                ],
            ),
            q(
                "What is the role of time in a narration?",
                [
                    "Situating the events",
                    "Describing characters",
                    "Defending a thesis",
                    "Presenting an argument",
                ],
            ),
            q(
                "The narrative space represents:",
                [
                    "The place where the story happens",
                    "The time of the events",
                    "The narrator's point of view",
                    "The main theme",
                ],
            ),
            q(
                "Who is the protagonist?",
                [
                    "The main character of the story",
                    "The observer narrator",
                    "The antagonist",
                    "The author of the text",
                ],
            ),
        ];
        Self { questions }
    }
}
