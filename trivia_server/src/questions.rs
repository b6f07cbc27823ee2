// Question-source collaborator boundary.
//
// The coordinator never fetches or translates questions itself — it
// consumes an ordered sequence supplied by a `QuestionSource` when a
// session starts. The trait is the seam where a real provider (HTTP API,
// database, file) plugs in; `FixedQuestionSource` serves tests and the
// standalone binary.

use trivia_protocol::message::{Question, SessionSettings};

/// Supplies the ordered question list for a session once it starts.
///
/// Implementations may consult the session settings (language, difficulty,
/// category, count). A failure reason is reported to the session's players
/// and leaves the session in the lobby.
pub trait QuestionSource: Send {
    fn fetch(&mut self, settings: &SessionSettings) -> Result<Vec<Question>, String>;
}

/// A fixed pool of questions, served in order and capped at
/// `questions_per_game`. Sessions get fewer questions when the pool is
/// smaller than requested.
pub struct FixedQuestionSource {
    pool: Vec<Question>,
}

impl FixedQuestionSource {
    pub fn new(pool: Vec<Question>) -> Self {
        Self { pool }
    }
}

impl QuestionSource for FixedQuestionSource {
    fn fetch(&mut self, settings: &SessionSettings) -> Result<Vec<Question>, String> {
        if self.pool.is_empty() {
            return Err("question pool is empty".into());
        }
        let count = (settings.questions_per_game as usize).min(self.pool.len());
        Ok(self.pool[..count].to_vec())
    }
}

/// Built-in general-knowledge set used by the binary when no question file
/// is given. Enough for a short demo match.
pub fn sample_questions() -> Vec<Question> {
    let raw = [
        ("What is the capital of Italy?", &["Rome", "Milan", "Naples", "Turin"][..], "Rome"),
        ("Which planet is known as the Red Planet?", &["Mars", "Venus", "Jupiter", "Mercury"], "Mars"),
        ("What is the largest ocean on Earth?", &["Pacific", "Atlantic", "Indian", "Arctic"], "Pacific"),
        ("Who painted the Mona Lisa?", &["Leonardo da Vinci", "Michelangelo", "Raphael", "Donatello"], "Leonardo da Vinci"),
        ("What is the chemical symbol for gold?", &["Au", "Ag", "Gd", "Go"], "Au"),
        ("How many continents are there?", &["7", "5", "6", "8"], "7"),
        ("In which year did the Berlin Wall fall?", &["1989", "1987", "1991", "1993"], "1989"),
        ("What is the smallest prime number?", &["2", "1", "3", "0"], "2"),
        ("Which language has the most native speakers?", &["Mandarin Chinese", "English", "Spanish", "Hindi"], "Mandarin Chinese"),
        ("What gas do plants absorb from the atmosphere?", &["Carbon dioxide", "Oxygen", "Nitrogen", "Hydrogen"], "Carbon dioxide"),
    ];
    raw.iter()
        .map(|(text, options, correct)| Question {
            text: (*text).into(),
            options: options.iter().map(|o| (*o).into()).collect(),
            correct_answer: (*correct).into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_caps_at_questions_per_game() {
        let mut source = FixedQuestionSource::new(sample_questions());
        let settings = SessionSettings {
            questions_per_game: 3,
            ..SessionSettings::default()
        };
        let questions = source.fetch(&settings).unwrap();
        assert_eq!(questions.len(), 3);
    }

    #[test]
    fn fixed_source_returns_whole_pool_when_small() {
        let mut source = FixedQuestionSource::new(sample_questions().into_iter().take(2).collect());
        let settings = SessionSettings::default(); // asks for 10
        assert_eq!(source.fetch(&settings).unwrap().len(), 2);
    }

    #[test]
    fn empty_pool_is_an_error() {
        let mut source = FixedQuestionSource::new(Vec::new());
        assert!(source.fetch(&SessionSettings::default()).is_err());
    }
}
