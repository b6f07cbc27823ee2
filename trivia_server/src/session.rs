// Session state for one multiplayer trivia match.
//
// `Session` is the central data structure that `server.rs` drives. It tracks
// the player roster, the ready set, the question sequence, per-question
// answers, and scoring. All mutation happens through methods called from
// the server's single-threaded event loop — no internal locking.
//
// The session holds no sockets. Every method that changes observable state
// returns the values the server needs to broadcast (round results, final
// scores, the next question), which keeps the state machine fully
// unit-testable without TCP and keeps the coordinator decoupled from its
// observers.
//
// State machine:
//
//   WaitingForPlayers → Starting → InProgress → QuestionActive
//        ↑                                           ↓
//        └─(question source failure)       WaitingAnswers → ShowingResults
//                                                ┌───────────────┘
//                                                └→ QuestionActive | Finished
//
// `Finished` is terminal: scores and questions never change afterwards.
// Answers are accepted only in `QuestionActive` — once the answer window
// closes (all answered, or the deadline fired), later submissions are
// rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Utc};

use trivia_protocol::message::{
    AnswerResult, PlayerInfo, Question, ScoreEntry, SessionSettings, SessionSnapshot,
};
use trivia_protocol::types::{PlayerId, SessionId, SessionState};

use crate::error::SessionError;

/// Points for a correct answer, before the speed bonus.
const BASE_SCORE: u32 = 100;

/// Maximum speed bonus, paid for an instantaneous correct answer.
const MAX_SPEED_BONUS: u32 = 50;

/// Bonus for answering `elapsed` seconds into a question with the given
/// time limit: `floor((limit - elapsed) / limit * 50)`, clamped at zero.
fn speed_bonus(elapsed: f64, time_limit: u32) -> u32 {
    let limit = f64::from(time_limit);
    if limit <= 0.0 || elapsed >= limit {
        return 0;
    }
    let fraction = (limit - elapsed.max(0.0)) / limit;
    (fraction * f64::from(MAX_SPEED_BONUS)).floor() as u32
}

/// Per-member state scoped to the session: display name, the current
/// question's answer, and the running score.
struct PlayerSlot {
    name: String,
    answer: Option<String>,
    answer_elapsed: Option<f64>,
    score: u32,
}

/// One multiplayer trivia match with a fixed roster and question sequence.
pub struct Session {
    id: SessionId,
    host: PlayerId,
    host_name: String,
    settings: SessionSettings,
    state: SessionState,
    players: BTreeMap<PlayerId, PlayerSlot>,
    ready: BTreeSet<PlayerId>,
    questions: Vec<Question>,
    current_question_index: usize,
    question_started: Option<Instant>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Create a session in the lobby state. The host is not added as a
    /// player automatically; the server adds them like any other member.
    pub fn new(
        id: SessionId,
        host: PlayerId,
        host_name: String,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id,
            host,
            host_name,
            settings,
            state: SessionState::WaitingForPlayers,
            players: BTreeMap::new(),
            ready: BTreeSet::new(),
            questions: Vec::new(),
            current_question_index: 0,
            question_started: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn host(&self) -> &PlayerId {
        &self.host
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains_key(player_id)
    }

    /// Member ids in deterministic (sorted) order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().cloned().collect()
    }

    /// Add a player to the lobby. Rejected once the match has started or
    /// when the roster is at `max_players`.
    pub fn add_player(&mut self, player_id: PlayerId, name: String) -> Result<(), SessionError> {
        if self.state != SessionState::WaitingForPlayers {
            return Err(SessionError::WrongState(self.state));
        }
        if self.players.len() as u32 >= self.settings.max_players {
            return Err(SessionError::Full);
        }
        self.players.insert(
            player_id,
            PlayerSlot {
                name,
                answer: None,
                answer_elapsed: None,
                score: 0,
            },
        );
        Ok(())
    }

    /// Remove a player from the roster and the ready set. Returns whether
    /// the player was a member. Ending the session when the host leaves is
    /// the caller's responsibility.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> bool {
        self.ready.remove(player_id);
        self.players.remove(player_id).is_some()
    }

    /// Toggle a player's membership in the ready set. Only meaningful in
    /// the lobby; no state transition by itself.
    pub fn set_ready(&mut self, player_id: &PlayerId, ready: bool) -> Result<(), SessionError> {
        if self.state != SessionState::WaitingForPlayers {
            return Err(SessionError::WrongState(self.state));
        }
        if !self.players.contains_key(player_id) {
            return Err(SessionError::UnknownPlayer);
        }
        if ready {
            self.ready.insert(player_id.clone());
        } else {
            self.ready.remove(player_id);
        }
        Ok(())
    }

    /// True iff every member is ready and the match has at least two
    /// participants.
    pub fn all_players_ready(&self) -> bool {
        self.ready.len() == self.players.len() && self.players.len() >= 2
    }

    /// Begin the match: lobby → `Starting`. The caller then fetches
    /// question content and either `load_questions` or `abort_start`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::WaitingForPlayers {
            return Err(SessionError::WrongState(self.state));
        }
        if !self.all_players_ready() {
            return Err(SessionError::NotReady);
        }
        self.state = SessionState::Starting;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Revert a failed start (question source error) back to the lobby.
    /// The ready set is cleared so players confirm again.
    pub fn abort_start(&mut self) {
        if self.state == SessionState::Starting {
            self.state = SessionState::WaitingForPlayers;
            self.started_at = None;
            self.ready.clear();
        }
    }

    /// Install the question sequence, capped at `questions_per_game`:
    /// `Starting` → `InProgress`. Returns the effective question count.
    pub fn load_questions(&mut self, mut questions: Vec<Question>) -> Result<u32, SessionError> {
        if self.state != SessionState::Starting {
            return Err(SessionError::WrongState(self.state));
        }
        questions.truncate(self.settings.questions_per_game as usize);
        self.questions = questions;
        self.state = SessionState::InProgress;
        Ok(self.questions.len() as u32)
    }

    /// Advance to the next question, resetting every member's answer and
    /// starting the clock: → `QuestionActive`. Returns `Ok(None)` when the
    /// sequence is exhausted, in which case the caller should `finish`.
    /// The returned index is the 1-based question number.
    pub fn next_question(&mut self) -> Result<Option<(u32, Question)>, SessionError> {
        if self.state != SessionState::InProgress && self.state != SessionState::ShowingResults {
            return Err(SessionError::WrongState(self.state));
        }
        if self.current_question_index >= self.questions.len() {
            return Ok(None);
        }
        let question = self.questions[self.current_question_index].clone();
        self.current_question_index += 1;
        self.question_started = Some(Instant::now());
        self.state = SessionState::QuestionActive;
        for slot in self.players.values_mut() {
            slot.answer = None;
            slot.answer_elapsed = None;
        }
        Ok(Some((self.current_question_index as u32, question)))
    }

    /// Number of questions loaded for this match.
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// The question currently being played (or just scored), if any.
    pub fn current_question(&self) -> Option<&Question> {
        if self.current_question_index == 0 {
            return None;
        }
        self.questions.get(self.current_question_index - 1)
    }

    /// Record a player's answer to the active question. First answer wins;
    /// answers outside `QuestionActive` are rejected (the window is closed
    /// once the deadline fires or everyone has answered).
    pub fn submit_answer(
        &mut self,
        player_id: &PlayerId,
        answer: String,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::QuestionActive {
            return Err(SessionError::WrongState(self.state));
        }
        let elapsed = self
            .question_started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or_default();
        self.record_answer(player_id, answer, elapsed)
    }

    fn record_answer(
        &mut self,
        player_id: &PlayerId,
        answer: String,
        elapsed: f64,
    ) -> Result<(), SessionError> {
        let slot = self
            .players
            .get_mut(player_id)
            .ok_or(SessionError::UnknownPlayer)?;
        if slot.answer.is_some() {
            return Err(SessionError::AlreadyAnswered);
        }
        slot.answer = Some(answer);
        slot.answer_elapsed = Some(elapsed);
        Ok(())
    }

    /// True iff every current member has answered the active question.
    pub fn all_answered(&self) -> bool {
        self.players.values().all(|slot| slot.answer.is_some())
    }

    /// True once the active question has outlived its time limit.
    pub fn question_expired(&self) -> bool {
        self.state == SessionState::QuestionActive
            && self.question_started.is_some_and(|started| {
                started.elapsed().as_secs_f64()
                    >= f64::from(self.settings.time_limit_per_question)
            })
    }

    /// Close the answer window: `QuestionActive` → `WaitingAnswers`.
    /// Submissions after this point are rejected.
    pub fn close_answer_window(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::QuestionActive {
            return Err(SessionError::WrongState(self.state));
        }
        self.state = SessionState::WaitingAnswers;
        Ok(())
    }

    /// Score the closed question: `WaitingAnswers` → `ShowingResults`.
    /// Correct answers earn `BASE_SCORE` plus the speed bonus; everyone
    /// else (wrong or silent) earns nothing. Returns per-player outcomes in
    /// roster order.
    pub fn calculate_scores(&mut self) -> Result<Vec<AnswerResult>, SessionError> {
        if self.state != SessionState::WaitingAnswers {
            return Err(SessionError::WrongState(self.state));
        }
        let correct_answer = self
            .current_question()
            .ok_or(SessionError::WrongState(self.state))?
            .correct_answer
            .clone();
        let time_limit = self.settings.time_limit_per_question;

        let mut results = Vec::with_capacity(self.players.len());
        for (player_id, slot) in &mut self.players {
            let correct = slot.answer.as_deref() == Some(correct_answer.as_str());
            let awarded = if correct {
                let elapsed = slot.answer_elapsed.unwrap_or(f64::from(time_limit));
                BASE_SCORE + speed_bonus(elapsed, time_limit)
            } else {
                0
            };
            slot.score += awarded;
            results.push(AnswerResult {
                player_id: player_id.clone(),
                player_name: slot.name.clone(),
                answer: slot.answer.clone(),
                correct,
                points_awarded: awarded,
                total_score: slot.score,
            });
        }
        self.state = SessionState::ShowingResults;
        Ok(results)
    }

    /// Terminate the match from any non-terminal state. After this no
    /// score or question mutation is possible.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Finished {
            return Err(SessionError::Finished);
        }
        self.state = SessionState::Finished;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Final ranking, descending by score. Ties keep roster order.
    pub fn final_scores(&self) -> Vec<ScoreEntry> {
        let mut scores: Vec<ScoreEntry> = self
            .players
            .iter()
            .map(|(player_id, slot)| ScoreEntry {
                player_id: player_id.clone(),
                player_name: slot.name.clone(),
                score: slot.score,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        scores
    }

    /// Serializable view of the session for create/join replies.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.clone(),
            host_player_id: self.host.clone(),
            host_player_name: self.host_name.clone(),
            settings: self.settings.clone(),
            state: self.state,
            current_question_index: self.current_question_index as u32,
            player_count: self.players.len() as u32,
            ready_count: self.ready.len() as u32,
            players: self
                .players
                .iter()
                .map(|(player_id, slot)| PlayerInfo {
                    player_id: player_id.clone(),
                    player_name: slot.name.clone(),
                    ready: self.ready.contains(player_id),
                    score: slot.score,
                })
                .collect(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PlayerId {
        PlayerId(format!("player-{n}"))
    }

    fn question(correct: &str) -> Question {
        Question {
            text: "Capital of Italy?".into(),
            options: vec!["Rome".into(), "Milan".into()],
            correct_answer: correct.into(),
        }
    }

    /// A lobby session hosted by player 1 with `players` members.
    fn lobby(players: u32, settings: SessionSettings) -> Session {
        let mut session = Session::new(
            SessionId("session-1".into()),
            pid(1),
            "Player One".into(),
            settings,
        );
        for n in 1..=players {
            session.add_player(pid(n), format!("Player {n}")).unwrap();
        }
        session
    }

    /// A two-player session driven to `QuestionActive` on one question.
    fn active_session(settings: SessionSettings) -> Session {
        let mut session = lobby(2, settings);
        session.set_ready(&pid(1), true).unwrap();
        session.set_ready(&pid(2), true).unwrap();
        session.start().unwrap();
        session.load_questions(vec![question("Rome")]).unwrap();
        let (index, _) = session.next_question().unwrap().unwrap();
        assert_eq!(index, 1);
        session
    }

    #[test]
    fn capacity_limit_enforced() {
        let settings = SessionSettings {
            max_players: 2,
            ..SessionSettings::default()
        };
        let mut session = lobby(2, settings);
        let err = session.add_player(pid(3), "Player 3".into()).unwrap_err();
        assert_eq!(err, SessionError::Full);
        assert_eq!(session.player_count(), 2);
    }

    #[test]
    fn join_rejected_after_start() {
        let mut session = active_session(SessionSettings::default());
        let err = session.add_player(pid(3), "Late".into()).unwrap_err();
        assert!(matches!(err, SessionError::WrongState(_)));
    }

    #[test]
    fn ready_gate_requires_two_players() {
        let mut session = lobby(1, SessionSettings::default());
        session.set_ready(&pid(1), true).unwrap();
        assert!(!session.all_players_ready());
        assert_eq!(session.start().unwrap_err(), SessionError::NotReady);
    }

    #[test]
    fn all_ready_with_two_players() {
        let mut session = lobby(2, SessionSettings::default());
        session.set_ready(&pid(1), true).unwrap();
        assert!(!session.all_players_ready());
        session.set_ready(&pid(2), true).unwrap();
        assert!(session.all_players_ready());
        // Un-ready drops the gate again.
        session.set_ready(&pid(2), false).unwrap();
        assert!(!session.all_players_ready());
    }

    #[test]
    fn set_ready_unknown_player_rejected() {
        let mut session = lobby(2, SessionSettings::default());
        let err = session.set_ready(&pid(9), true).unwrap_err();
        assert_eq!(err, SessionError::UnknownPlayer);
    }

    #[test]
    fn removing_player_clears_ready_flag() {
        let mut session = lobby(3, SessionSettings::default());
        session.set_ready(&pid(2), true).unwrap();
        assert!(session.remove_player(&pid(2)));
        assert!(!session.contains_player(&pid(2)));
        // The ready set never contains a non-member.
        assert_eq!(session.snapshot().ready_count, 0);
    }

    #[test]
    fn abort_start_returns_to_lobby_and_clears_ready() {
        let mut session = lobby(2, SessionSettings::default());
        session.set_ready(&pid(1), true).unwrap();
        session.set_ready(&pid(2), true).unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Starting);
        session.abort_start();
        assert_eq!(session.state(), SessionState::WaitingForPlayers);
        assert!(!session.all_players_ready());
    }

    #[test]
    fn load_questions_caps_at_questions_per_game() {
        let settings = SessionSettings {
            questions_per_game: 2,
            ..SessionSettings::default()
        };
        let mut session = lobby(2, settings);
        session.set_ready(&pid(1), true).unwrap();
        session.set_ready(&pid(2), true).unwrap();
        session.start().unwrap();
        let count = session
            .load_questions(vec![question("a"), question("b"), question("c")])
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn first_answer_wins() {
        let mut session = active_session(SessionSettings::default());
        session.submit_answer(&pid(1), "Rome".into()).unwrap();
        let err = session.submit_answer(&pid(1), "Milan".into()).unwrap_err();
        assert_eq!(err, SessionError::AlreadyAnswered);

        session.submit_answer(&pid(2), "Milan".into()).unwrap();
        session.close_answer_window().unwrap();
        let results = session.calculate_scores().unwrap();
        // The first answer ("Rome") stands and scores.
        let p1 = results.iter().find(|r| r.player_id == pid(1)).unwrap();
        assert_eq!(p1.answer.as_deref(), Some("Rome"));
        assert!(p1.correct);
    }

    #[test]
    fn answer_from_unknown_player_rejected() {
        let mut session = active_session(SessionSettings::default());
        let err = session.submit_answer(&pid(9), "Rome".into()).unwrap_err();
        assert_eq!(err, SessionError::UnknownPlayer);
    }

    #[test]
    fn late_answer_rejected_after_window_closes() {
        let mut session = active_session(SessionSettings::default());
        session.close_answer_window().unwrap();
        let err = session.submit_answer(&pid(1), "Rome".into()).unwrap_err();
        assert_eq!(err, SessionError::WrongState(SessionState::WaitingAnswers));
    }

    #[test]
    fn scoring_is_deterministic_in_elapsed_time() {
        // (elapsed seconds, expected award) for a correct answer with a
        // 30-second limit: base 100 + floor((30 - elapsed) / 30 * 50).
        for (elapsed, expected) in [(0.0, 150), (5.0, 141), (15.0, 125), (30.0, 100)] {
            let mut session = active_session(SessionSettings::default());
            session.record_answer(&pid(1), "Rome".into(), elapsed).unwrap();
            session.record_answer(&pid(2), "Milan".into(), elapsed).unwrap();
            session.close_answer_window().unwrap();
            let results = session.calculate_scores().unwrap();
            let p1 = results.iter().find(|r| r.player_id == pid(1)).unwrap();
            let p2 = results.iter().find(|r| r.player_id == pid(2)).unwrap();
            assert_eq!(p1.points_awarded, expected, "elapsed {elapsed}");
            assert_eq!(p2.points_awarded, 0, "wrong answer always scores 0");
        }
    }

    #[test]
    fn unanswered_player_scores_zero() {
        let mut session = active_session(SessionSettings::default());
        session.record_answer(&pid(1), "Rome".into(), 2.0).unwrap();
        session.close_answer_window().unwrap();
        let results = session.calculate_scores().unwrap();
        let p2 = results.iter().find(|r| r.player_id == pid(2)).unwrap();
        assert_eq!(p2.answer, None);
        assert_eq!(p2.points_awarded, 0);
        assert_eq!(p2.total_score, 0);
    }

    #[test]
    fn scores_accumulate_across_questions() {
        let settings = SessionSettings {
            questions_per_game: 2,
            ..SessionSettings::default()
        };
        let mut session = lobby(2, settings);
        session.set_ready(&pid(1), true).unwrap();
        session.set_ready(&pid(2), true).unwrap();
        session.start().unwrap();
        session
            .load_questions(vec![question("Rome"), question("Rome")])
            .unwrap();

        for _ in 0..2 {
            session.next_question().unwrap().unwrap();
            session.record_answer(&pid(1), "Rome".into(), 30.0).unwrap();
            session.record_answer(&pid(2), "Milan".into(), 1.0).unwrap();
            session.close_answer_window().unwrap();
            session.calculate_scores().unwrap();
        }

        assert_eq!(session.next_question().unwrap(), None);
        session.finish().unwrap();
        let ranking = session.final_scores();
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].player_id, pid(1));
        assert_eq!(ranking[0].score, 200);
        assert_eq!(ranking[1].score, 0);
    }

    #[test]
    fn all_answered_tracks_roster() {
        let mut session = active_session(SessionSettings::default());
        assert!(!session.all_answered());
        session.submit_answer(&pid(1), "Rome".into()).unwrap();
        assert!(!session.all_answered());
        session.submit_answer(&pid(2), "Milan".into()).unwrap();
        assert!(session.all_answered());
    }

    #[test]
    fn finished_is_terminal() {
        let mut session = active_session(SessionSettings::default());
        session.finish().unwrap();
        assert_eq!(session.state(), SessionState::Finished);

        let err = session.submit_answer(&pid(1), "Rome".into()).unwrap_err();
        assert_eq!(err, SessionError::WrongState(SessionState::Finished));
        assert_eq!(session.finish().unwrap_err(), SessionError::Finished);
        assert!(matches!(
            session.next_question().unwrap_err(),
            SessionError::WrongState(_)
        ));
    }

    #[test]
    fn question_numbering_is_one_based() {
        let settings = SessionSettings {
            questions_per_game: 2,
            ..SessionSettings::default()
        };
        let mut session = lobby(2, settings);
        session.set_ready(&pid(1), true).unwrap();
        session.set_ready(&pid(2), true).unwrap();
        session.start().unwrap();
        session
            .load_questions(vec![question("a"), question("b")])
            .unwrap();

        let (first, _) = session.next_question().unwrap().unwrap();
        assert_eq!(first, 1);
        session.close_answer_window().unwrap();
        session.calculate_scores().unwrap();
        let (second, q) = session.next_question().unwrap().unwrap();
        assert_eq!(second, 2);
        assert_eq!(q.correct_answer, "b");
    }

    #[test]
    fn snapshot_reflects_lobby_state() {
        let mut session = lobby(2, SessionSettings::default());
        session.set_ready(&pid(2), true).unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::WaitingForPlayers);
        assert_eq!(snapshot.player_count, 2);
        assert_eq!(snapshot.ready_count, 1);
        assert_eq!(snapshot.current_question_index, 0);
        let member = snapshot
            .players
            .iter()
            .find(|p| p.player_id == pid(2))
            .unwrap();
        assert!(member.ready);
        assert_eq!(member.score, 0);
    }

    #[test]
    fn speed_bonus_boundaries() {
        assert_eq!(speed_bonus(0.0, 30), 50);
        assert_eq!(speed_bonus(15.0, 30), 25);
        assert_eq!(speed_bonus(30.0, 30), 0);
        assert_eq!(speed_bonus(45.0, 30), 0);
        // Negative elapsed (clock skew) clamps to the full bonus.
        assert_eq!(speed_bonus(-1.0, 30), 50);
        assert_eq!(speed_bonus(5.0, 0), 0);
    }
}
