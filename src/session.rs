//! Challenge session state machine.
//!
//! `ChallengeSession` owns every piece of session-local state and only changes
//! through the named transitions below. Transitions that need the external
//! service do not call it: they return a `Ticket` describing the request, and
//! the caller hands the provider's answer back through the matching `finish_*`
//! method. A ticket records the challenge epoch, view epoch and per-phase
//! sequence it was issued under. If any of those moved on in the meantime,
//! the result is stale and is dropped without touching state.

use serde::Serialize;
use tracing::debug;

use crate::domain::{
    Challenge, ConfigDraft, Difficulty, GradingResult, QuestionType, RealizedType, SessionConfig,
    SolutionReveal, TypePreference,
};
use crate::error::{Phase, ProviderError, SessionError};
use crate::providers::{
    AnswerGradingRequest, CodeGradingRequest, GenerationRequest, GradingRequest, HintRequest,
    SolutionRequest,
};

/// Request snapshot issued by a transition, checked again on resolution.
#[derive(Debug, Clone)]
pub struct Ticket<R> {
    epoch: u64,
    view_epoch: u64,
    seq: u64,
    pub request: R,
}

/// Whether a provider result was installed or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Unconfigured,
    FetchingChallenge,
    ChallengeReady,
    Submitting,
    Graded,
    FetchingSolution,
    SolutionReady,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseFlags {
    pub fetching_challenge: bool,
    pub submitting: bool,
    pub fetching_solution: bool,
    pub fetching_hint: bool,
}

impl PhaseFlags {
    pub fn any(&self) -> bool {
        self.fetching_challenge || self.submitting || self.fetching_solution || self.fetching_hint
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseErrors {
    pub generation: Option<String>,
    pub grading: Option<String>,
    pub solution: Option<String>,
    pub hint: Option<String>,
    pub validation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct PhaseSeq {
    grading: u64,
    solution: u64,
    hint: u64,
}

/// Which intents the client may raise right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Controls {
    pub can_edit: bool,
    pub can_submit: bool,
    pub can_reveal_solution: bool,
    pub can_reveal_hint: bool,
    pub can_switch_view: bool,
    pub can_restart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    pub realized: RealizedType,
    pub coding_question: Option<String>,
    pub conceptual_question: Option<String>,
    /// Question for the active view.
    pub question: Option<String>,
}

/// Read-only snapshot sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: String,
    pub phase: SessionPhase,
    pub config: ConfigDraft,
    pub challenge: Option<ChallengeView>,
    pub active_view: Option<QuestionType>,
    /// Only present once the learner asked for it.
    pub hint: Option<String>,
    pub code_draft: String,
    pub conceptual_draft: String,
    pub grading: Option<GradingResult>,
    pub solution: Option<SolutionReveal>,
    pub flags: PhaseFlags,
    pub errors: PhaseErrors,
    pub controls: Controls,
}

#[derive(Debug)]
pub struct ChallengeSession {
    id: String,
    draft: ConfigDraft,
    /// Config the current challenge epoch was fetched under.
    config: Option<SessionConfig>,
    epoch: u64,
    view_epoch: u64,
    seq: PhaseSeq,
    challenge: Option<Challenge>,
    active_view: Option<QuestionType>,
    code_draft: String,
    conceptual_draft: String,
    hint_revealed: bool,
    grading: Option<GradingResult>,
    solution: Option<SolutionReveal>,
    flags: PhaseFlags,
    errors: PhaseErrors,
}

impl ChallengeSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            draft: ConfigDraft::default(),
            config: None,
            epoch: 0,
            view_epoch: 0,
            seq: PhaseSeq::default(),
            challenge: None,
            active_view: None,
            code_draft: String::new(),
            conceptual_draft: String::new(),
            hint_revealed: false,
            grading: None,
            solution: None,
            flags: PhaseFlags::default(),
            errors: PhaseErrors::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // ---------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------

    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Option<Ticket<GenerationRequest>> {
        self.configure(ConfigDraft { difficulty: Some(difficulty), ..Default::default() })
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) -> Option<Ticket<GenerationRequest>> {
        self.configure(ConfigDraft { topic: Some(topic.into()), ..Default::default() })
    }

    pub fn set_type_preference(&mut self, pref: TypePreference) -> Option<Ticket<GenerationRequest>> {
        self.configure(ConfigDraft { type_preference: Some(pref), ..Default::default() })
    }

    /// Merge the fields present in `update` into the selection.
    ///
    /// Any real change discards the challenge and everything derived from it
    /// before returning. A complete config yields exactly one generation
    /// ticket. An incomplete one leaves the session unconfigured.
    pub fn configure(&mut self, update: ConfigDraft) -> Option<Ticket<GenerationRequest>> {
        let mut next = self.draft.clone();
        if let Some(d) = update.difficulty {
            next.difficulty = Some(d);
        }
        if let Some(t) = update.topic {
            next.topic = Some(t.trim().to_string());
        }
        if let Some(p) = update.type_preference {
            next.type_preference = Some(p);
        }
        if next == self.draft {
            return None;
        }

        self.draft = next;
        self.reset_challenge();
        match self.draft.complete() {
            Some(cfg) => Some(self.issue_generation(cfg)),
            None => {
                debug!(target: "session", id = %self.id, "Config incomplete; session unconfigured");
                None
            }
        }
    }

    /// New challenge for the unchanged config.
    pub fn restart(&mut self) -> Result<Ticket<GenerationRequest>, SessionError> {
        let cfg = self.draft.complete().ok_or_else(|| {
            self.reject("Choose a difficulty, a topic and a question type first.")
        })?;
        self.reset_challenge();
        Ok(self.issue_generation(cfg))
    }

    pub fn finish_generation(
        &mut self,
        ticket: Ticket<GenerationRequest>,
        result: Result<Challenge, ProviderError>,
    ) -> Resolution {
        if ticket.epoch != self.epoch {
            debug!(target: "session", id = %self.id, ticket_epoch = ticket.epoch, epoch = self.epoch, "Dropping stale challenge");
            return Resolution::Stale;
        }
        self.flags.fetching_challenge = false;
        match result {
            Ok(challenge) => {
                self.active_view = Some(challenge.realized().default_view());
                self.challenge = Some(challenge);
            }
            Err(e) => self.errors.generation = Some(SessionError::Generation(e).to_string()),
        }
        Resolution::Applied
    }

    // ---------------------------------------------------------------
    // View and drafts
    // ---------------------------------------------------------------

    /// Returns `Ok(false)` when `view` is already active.
    pub fn switch_view(&mut self, view: QuestionType) -> Result<bool, SessionError> {
        let realized = match self.challenge.as_ref().map(Challenge::realized) {
            Some(r) => r,
            None => return Err(self.reject("There is no challenge to switch views on yet.")),
        };
        if !realized.includes(view) {
            return Err(self.reject(&format!("This challenge has no {view} question.")));
        }
        if self.active_view == Some(view) {
            return Ok(false);
        }

        self.view_epoch += 1;
        self.active_view = Some(view);
        self.clear_attempt();
        Ok(true)
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<(), SessionError> {
        let view = match self.active_view {
            Some(v) => v,
            None => return Err(self.reject("There is no question to answer yet.")),
        };
        match view {
            QuestionType::Coding => self.code_draft = text.into(),
            QuestionType::Conceptual => self.conceptual_draft = text.into(),
        }
        self.errors.validation = None;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Grading
    // ---------------------------------------------------------------

    pub fn begin_submission(&mut self) -> Result<Ticket<GradingRequest>, SessionError> {
        if self.flags.submitting {
            return Err(SessionError::Busy(Phase::Grading));
        }
        let (cfg, view, question) = self.active_context()?;
        let draft = self.draft_for(view).to_string();
        if draft.trim().is_empty() {
            let msg = match view {
                QuestionType::Coding => "Code editor is empty. Write your code before submitting.",
                QuestionType::Conceptual => "Answer field is empty. Write your answer before submitting.",
            };
            return Err(self.reject(msg));
        }

        self.grading = None;
        self.solution = None;
        self.errors.grading = None;
        self.errors.solution = None;
        self.errors.validation = None;
        // A fresh attempt also orphans any solution still being generated.
        self.flags.fetching_solution = false;
        self.seq.solution += 1;
        self.seq.grading += 1;
        self.flags.submitting = true;

        let request = match view {
            QuestionType::Coding => GradingRequest::Code(CodeGradingRequest {
                code: draft,
                topic: cfg.topic,
                difficulty: cfg.difficulty,
            }),
            QuestionType::Conceptual => GradingRequest::Conceptual(AnswerGradingRequest {
                user_answer: draft,
                question,
                topic: cfg.topic,
                difficulty: cfg.difficulty,
            }),
        };
        Ok(self.ticket(self.seq.grading, request))
    }

    pub fn finish_submission(
        &mut self,
        ticket: Ticket<GradingRequest>,
        result: Result<GradingResult, ProviderError>,
    ) -> Resolution {
        if !self.is_current(&ticket, self.seq.grading) {
            debug!(target: "session", id = %self.id, "Dropping stale grading result");
            return Resolution::Stale;
        }
        self.flags.submitting = false;
        match result {
            Ok(r) => self.grading = Some(r),
            Err(e) => self.errors.grading = Some(SessionError::Grading(e).to_string()),
        }
        Resolution::Applied
    }

    // ---------------------------------------------------------------
    // Solution
    // ---------------------------------------------------------------

    pub fn begin_solution(&mut self) -> Result<Ticket<SolutionRequest>, SessionError> {
        if self.flags.fetching_solution {
            return Err(SessionError::Busy(Phase::Solution));
        }
        let (cfg, view, question) = self.active_context()?;

        self.solution = None;
        self.errors.solution = None;
        self.errors.validation = None;
        self.seq.solution += 1;
        self.flags.fetching_solution = true;

        let request = SolutionRequest {
            topic: cfg.topic,
            difficulty: cfg.difficulty,
            question,
            question_type: view,
        };
        Ok(self.ticket(self.seq.solution, request))
    }

    pub fn finish_solution(
        &mut self,
        ticket: Ticket<SolutionRequest>,
        result: Result<SolutionReveal, ProviderError>,
    ) -> Resolution {
        if !self.is_current(&ticket, self.seq.solution) {
            debug!(target: "session", id = %self.id, "Dropping stale solution");
            return Resolution::Stale;
        }
        self.flags.fetching_solution = false;
        match result {
            Ok(s) => self.solution = Some(s),
            Err(e) => self.errors.solution = Some(SessionError::Solution(e).to_string()),
        }
        Resolution::Applied
    }

    // ---------------------------------------------------------------
    // Hint
    // ---------------------------------------------------------------

    /// Reveal the active view's hint. Returns a ticket only when the
    /// challenge came without one and it must be generated.
    pub fn reveal_hint(&mut self) -> Result<Option<Ticket<HintRequest>>, SessionError> {
        let (cfg, view, question) = self.active_context()?;
        let has_hint = self
            .challenge
            .as_ref()
            .and_then(|c| c.hint(view))
            .is_some();
        if has_hint {
            self.hint_revealed = true;
            return Ok(None);
        }
        if self.flags.fetching_hint {
            return Err(SessionError::Busy(Phase::Hint));
        }

        self.errors.hint = None;
        self.seq.hint += 1;
        self.flags.fetching_hint = true;
        let request = HintRequest { question, topic: cfg.topic, difficulty: cfg.difficulty };
        Ok(Some(self.ticket(self.seq.hint, request)))
    }

    pub fn finish_hint(&mut self, ticket: Ticket<HintRequest>, result: Result<String, ProviderError>) -> Resolution {
        if !self.is_current(&ticket, self.seq.hint) {
            debug!(target: "session", id = %self.id, "Dropping stale hint");
            return Resolution::Stale;
        }
        self.flags.fetching_hint = false;
        match (result, self.active_view, self.challenge.as_mut()) {
            (Ok(hint), Some(view), Some(challenge)) => {
                challenge.set_hint(view, hint);
                self.hint_revealed = true;
            }
            (Err(e), _, _) => self.errors.hint = Some(SessionError::Hint(e).to_string()),
            // Current ticket implies challenge and view are still present.
            _ => {}
        }
        Resolution::Applied
    }

    // ---------------------------------------------------------------
    // Snapshot
    // ---------------------------------------------------------------

    pub fn phase(&self) -> SessionPhase {
        if self.flags.fetching_challenge {
            return SessionPhase::FetchingChallenge;
        }
        if self.challenge.is_none() {
            return if self.errors.generation.is_some() {
                SessionPhase::Error
            } else {
                SessionPhase::Unconfigured
            };
        }
        if self.flags.submitting {
            SessionPhase::Submitting
        } else if self.flags.fetching_solution {
            SessionPhase::FetchingSolution
        } else if self.solution.is_some() {
            SessionPhase::SolutionReady
        } else if self.errors.grading.is_some() || self.errors.solution.is_some() {
            SessionPhase::Error
        } else if self.grading.is_some() {
            SessionPhase::Graded
        } else {
            SessionPhase::ChallengeReady
        }
    }

    pub fn controls(&self) -> Controls {
        let idle = !self.flags.any();
        let question = self.active_question().is_some();
        let draft_ready = self
            .active_view
            .map(|v| !self.draft_for(v).trim().is_empty())
            .unwrap_or(false);
        Controls {
            can_edit: idle && question,
            can_submit: idle && question && draft_ready,
            can_reveal_solution: idle && question,
            can_reveal_hint: idle && question && !self.hint_revealed,
            can_switch_view: idle
                && self
                    .challenge
                    .as_ref()
                    .map(|c| c.realized() == RealizedType::Both)
                    .unwrap_or(false),
            can_restart: idle && self.draft.complete().is_some(),
        }
    }

    pub fn snapshot(&self) -> SessionView {
        let challenge = self.challenge.as_ref().map(|c| ChallengeView {
            realized: c.realized(),
            coding_question: c.question(QuestionType::Coding).map(str::to_string),
            conceptual_question: c.question(QuestionType::Conceptual).map(str::to_string),
            question: self.active_question().map(str::to_string),
        });
        let hint = match (self.hint_revealed, self.active_view, &self.challenge) {
            (true, Some(v), Some(c)) => c.hint(v).map(str::to_string),
            _ => None,
        };
        SessionView {
            id: self.id.clone(),
            phase: self.phase(),
            config: self.draft.clone(),
            challenge,
            active_view: self.active_view,
            hint,
            code_draft: self.code_draft.clone(),
            conceptual_draft: self.conceptual_draft.clone(),
            grading: self.grading.clone(),
            solution: self.solution.clone(),
            flags: self.flags.clone(),
            errors: self.errors.clone(),
            controls: self.controls(),
        }
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn reset_challenge(&mut self) {
        self.epoch += 1;
        self.view_epoch += 1;
        self.config = None;
        self.challenge = None;
        self.active_view = None;
        self.flags = PhaseFlags::default();
        self.errors = PhaseErrors::default();
        self.clear_attempt();
    }

    /// Drafts, grading, solution and hint state for the current view.
    fn clear_attempt(&mut self) {
        self.code_draft.clear();
        self.conceptual_draft.clear();
        self.hint_revealed = false;
        self.grading = None;
        self.solution = None;
        self.flags.submitting = false;
        self.flags.fetching_solution = false;
        self.flags.fetching_hint = false;
        self.errors.grading = None;
        self.errors.solution = None;
        self.errors.hint = None;
        self.errors.validation = None;
    }

    fn issue_generation(&mut self, cfg: SessionConfig) -> Ticket<GenerationRequest> {
        self.flags.fetching_challenge = true;
        let request = GenerationRequest {
            topic: cfg.topic.clone(),
            difficulty: cfg.difficulty,
            type_preference: cfg.type_preference,
        };
        self.config = Some(cfg);
        self.ticket(0, request)
    }

    fn ticket<R>(&self, seq: u64, request: R) -> Ticket<R> {
        Ticket { epoch: self.epoch, view_epoch: self.view_epoch, seq, request }
    }

    fn is_current<R>(&self, ticket: &Ticket<R>, seq: u64) -> bool {
        ticket.epoch == self.epoch && ticket.view_epoch == self.view_epoch && ticket.seq == seq
    }

    fn draft_for(&self, view: QuestionType) -> &str {
        match view {
            QuestionType::Coding => &self.code_draft,
            QuestionType::Conceptual => &self.conceptual_draft,
        }
    }

    fn active_question(&self) -> Option<&str> {
        let view = self.active_view?;
        self.challenge.as_ref()?.question(view)
    }

    fn active_context(&mut self) -> Result<(SessionConfig, QuestionType, String), SessionError> {
        let ctx = match (&self.config, self.active_view, self.active_question()) {
            (Some(cfg), Some(view), Some(q)) => Some((cfg.clone(), view, q.to_string())),
            _ => None,
        };
        ctx.ok_or_else(|| self.reject("There is no active question yet."))
    }

    /// Record a local validation failure and hand it back as an error.
    fn reject(&mut self, msg: &str) -> SessionError {
        self.errors.validation = Some(msg.to_string());
        SessionError::Validation(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testing::{coding_challenge, dual_challenge, graded};

    fn configured(pref: TypePreference) -> (ChallengeSession, Ticket<GenerationRequest>) {
        let mut s = ChallengeSession::new("s1");
        assert!(s.set_difficulty(Difficulty::Beginner).is_none());
        assert!(s.set_topic("Bubble Sort").is_none());
        let t = s.set_type_preference(pref).expect("complete config issues a ticket");
        (s, t)
    }

    fn ready_dual() -> ChallengeSession {
        let (mut s, t) = configured(TypePreference::Either);
        assert_eq!(s.finish_generation(t, Ok(dual_challenge())), Resolution::Applied);
        s
    }

    #[test]
    fn incomplete_config_stays_unconfigured() {
        let mut s = ChallengeSession::new("s1");
        assert!(s.set_topic("Graphs").is_none());
        assert_eq!(s.phase(), SessionPhase::Unconfigured);
        assert!(!s.snapshot().controls.can_restart);
    }

    #[test]
    fn config_change_clears_everything_before_fetch_resolves() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("Implement bubble sort", "Nested loops")));
        s.update_draft("fn sort() {}").unwrap();
        let g = s.begin_submission().unwrap();
        s.finish_submission(g, Ok(graded(70, true, "ok")));
        let sol = s.begin_solution().unwrap();
        s.finish_solution(sol, Ok(SolutionReveal { solution: "x".into(), explanation: None }));

        let ticket = s.set_difficulty(Difficulty::Advanced);
        assert!(ticket.is_some());
        let v = s.snapshot();
        assert_eq!(v.phase, SessionPhase::FetchingChallenge);
        assert!(v.challenge.is_none());
        assert!(v.code_draft.is_empty());
        assert!(v.grading.is_none());
        assert!(v.solution.is_none());
        assert!(v.flags.fetching_challenge);
    }

    #[test]
    fn unchanged_value_is_a_no_op() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        assert!(s.set_topic(" Bubble Sort ").is_none());
        assert!(s.snapshot().challenge.is_some());
    }

    #[test]
    fn clearing_topic_returns_to_unconfigured() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        assert!(s.set_topic("   ").is_none());
        let v = s.snapshot();
        assert_eq!(v.phase, SessionPhase::Unconfigured);
        assert!(v.challenge.is_none());
        assert!(!v.flags.any());
    }

    #[test]
    fn superseded_generation_is_discarded() {
        let (mut s, first) = configured(TypePreference::Coding);
        let second = s.set_topic("Quick Sort").unwrap();

        assert_eq!(s.finish_generation(first, Ok(coding_challenge("stale", "h"))), Resolution::Stale);
        assert!(s.snapshot().challenge.is_none());
        assert!(s.snapshot().flags.fetching_challenge);

        s.finish_generation(second, Ok(coding_challenge("Implement quick sort", "Pivot")));
        assert_eq!(s.snapshot().challenge.unwrap().question.as_deref(), Some("Implement quick sort"));
    }

    #[test]
    fn stale_failure_does_not_set_an_error() {
        let (mut s, first) = configured(TypePreference::Coding);
        let _second = s.restart().unwrap();
        assert_eq!(s.finish_generation(first, Err(ProviderError::Transport("timeout".into()))), Resolution::Stale);
        assert!(s.snapshot().errors.generation.is_none());
    }

    #[test]
    fn generation_failure_sets_phase_error() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Err(ProviderError::Malformed("bad json".into())));
        let v = s.snapshot();
        assert_eq!(v.phase, SessionPhase::Error);
        assert!(!v.flags.fetching_challenge);
        assert!(v.errors.generation.unwrap().contains("bad json"));
        assert!(v.controls.can_restart);
    }

    #[test]
    fn empty_submission_is_rejected_locally() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        s.update_draft("   \n").unwrap();
        let err = s.begin_submission().unwrap_err();
        assert!(matches!(err, SessionError::Validation(_)));
        let v = s.snapshot();
        assert!(!v.flags.submitting);
        assert!(v.errors.validation.is_some());
    }

    #[test]
    fn second_submit_while_grading_is_busy() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        s.update_draft("code").unwrap();
        let _g = s.begin_submission().unwrap();
        assert_eq!(s.begin_submission().unwrap_err(), SessionError::Busy(Phase::Grading));
    }

    #[test]
    fn bubble_sort_scenario() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("Implement bubble sort", "Think about nested loops")));
        s.update_draft("function bubbleSort(){}").unwrap();
        let g = s.begin_submission().unwrap();
        match &g.request {
            GradingRequest::Code(r) => {
                assert_eq!(r.code, "function bubbleSort(){}");
                assert_eq!(r.topic, "Bubble Sort");
                assert_eq!(r.difficulty, Difficulty::Beginner);
            }
            other => panic!("expected code grading, got {other:?}"),
        }
        s.finish_submission(g, Ok(graded(40, false, "Incomplete")));
        let v = s.snapshot();
        let r = v.grading.unwrap();
        assert!(!r.passed);
        assert_eq!(r.score, 40);
        assert_eq!(v.phase, SessionPhase::Graded);
    }

    #[test]
    fn dual_challenge_defaults_to_coding_and_switch_clears_attempt() {
        let mut s = ready_dual();
        assert_eq!(s.snapshot().active_view, Some(QuestionType::Coding));

        s.update_draft("let x = 1;").unwrap();
        let g = s.begin_submission().unwrap();
        s.finish_submission(g, Ok(graded(80, true, "nice")));
        let sol = s.begin_solution().unwrap();
        s.finish_solution(sol, Ok(SolutionReveal { solution: "let x = 2;".into(), explanation: None }));
        let before = s.snapshot();
        assert!(before.grading.is_some() && before.solution.is_some());

        assert_eq!(s.switch_view(QuestionType::Conceptual), Ok(true));
        let v = s.snapshot();
        assert_eq!(v.active_view, Some(QuestionType::Conceptual));
        assert!(v.code_draft.is_empty());
        assert!(v.conceptual_draft.is_empty());
        assert!(v.grading.is_none());
        assert!(v.solution.is_none());
        assert_eq!(v.challenge.unwrap().question.as_deref(), Some("Why are linked lists cache-unfriendly?"));
    }

    #[test]
    fn solution_for_old_view_is_dropped_after_switch() {
        let mut s = ready_dual();
        let sol = s.begin_solution().unwrap();
        assert_eq!(sol.request.question_type, QuestionType::Coding);
        s.switch_view(QuestionType::Conceptual).unwrap();
        assert!(!s.snapshot().flags.fetching_solution);

        let late = SolutionReveal { solution: "fn reverse() {}".into(), explanation: None };
        assert_eq!(s.finish_solution(sol, Ok(late)), Resolution::Stale);
        assert!(s.snapshot().solution.is_none());
    }

    #[test]
    fn grading_for_old_view_is_dropped_after_switch() {
        let mut s = ready_dual();
        s.update_draft("code").unwrap();
        let g = s.begin_submission().unwrap();
        s.switch_view(QuestionType::Conceptual).unwrap();
        s.update_draft("because pointers").unwrap();

        assert_eq!(s.finish_submission(g, Ok(graded(100, true, "perfect"))), Resolution::Stale);
        let v = s.snapshot();
        assert!(v.grading.is_none());
        assert_eq!(v.conceptual_draft, "because pointers");
    }

    #[test]
    fn cannot_switch_to_unrealized_view() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        assert!(matches!(s.switch_view(QuestionType::Conceptual), Err(SessionError::Validation(_))));
        assert_eq!(s.switch_view(QuestionType::Coding), Ok(false));
    }

    #[test]
    fn conceptual_submission_uses_answer_contract() {
        let mut s = ready_dual();
        s.switch_view(QuestionType::Conceptual).unwrap();
        s.update_draft("Nodes are scattered in memory").unwrap();
        let g = s.begin_submission().unwrap();
        match g.request {
            GradingRequest::Conceptual(r) => {
                assert_eq!(r.question, "Why are linked lists cache-unfriendly?");
                assert_eq!(r.user_answer, "Nodes are scattered in memory");
            }
            other => panic!("expected conceptual grading, got {other:?}"),
        }
    }

    #[test]
    fn solution_without_grading_and_failure_keeps_grading() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));

        let sol = s.begin_solution().unwrap();
        assert_eq!(sol.request.question_type, QuestionType::Coding);
        s.finish_solution(sol, Ok(SolutionReveal { solution: "fn a() {}".into(), explanation: None }));
        assert_eq!(s.phase(), SessionPhase::SolutionReady);

        s.update_draft("code").unwrap();
        let g = s.begin_submission().unwrap();
        assert!(s.snapshot().solution.is_none(), "resubmission clears the old solution");
        s.finish_submission(g, Ok(graded(55, false, "close")));

        let sol = s.begin_solution().unwrap();
        s.finish_solution(sol, Err(ProviderError::Status { status: 500, message: "boom".into() }));
        let v = s.snapshot();
        assert_eq!(v.grading.unwrap().score, 55);
        assert!(v.errors.solution.is_some());
        assert_eq!(v.phase, SessionPhase::Error);
    }

    #[test]
    fn submission_orphans_pending_solution() {
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        let sol = s.begin_solution().unwrap();
        s.update_draft("code").unwrap();
        let _g = s.begin_submission().unwrap();
        assert_eq!(
            s.finish_solution(sol, Ok(SolutionReveal { solution: "late".into(), explanation: None })),
            Resolution::Stale
        );
        assert!(s.snapshot().solution.is_none());
    }

    #[test]
    fn hint_is_revealed_from_challenge_or_generated() {
        let mut s = ready_dual();
        assert!(s.snapshot().hint.is_none());
        assert!(s.reveal_hint().unwrap().is_none());
        assert_eq!(s.snapshot().hint.as_deref(), Some("Track the previous node"));

        s.switch_view(QuestionType::Conceptual).unwrap();
        assert!(s.snapshot().hint.is_none());
        let t = s.reveal_hint().unwrap().expect("conceptual half has no hint");
        assert_eq!(s.reveal_hint().unwrap_err(), SessionError::Busy(Phase::Hint));
        s.finish_hint(t, Ok("Think about CPU caches".into()));
        let v = s.snapshot();
        assert_eq!(v.hint.as_deref(), Some("Think about CPU caches"));
        assert!(!v.controls.can_reveal_hint);
    }

    #[test]
    fn controls_are_disabled_while_busy() {
        let (mut s, t) = configured(TypePreference::Coding);
        assert!(!s.controls().can_restart);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        assert!(!s.controls().can_submit, "empty draft");
        s.update_draft("code").unwrap();
        assert!(s.controls().can_submit);
        let _g = s.begin_submission().unwrap();
        let c = s.controls();
        assert!(!c.can_submit && !c.can_edit && !c.can_reveal_solution && !c.can_restart);
    }

    #[test]
    fn restart_requires_complete_config() {
        let mut s = ChallengeSession::new("s1");
        assert!(matches!(s.restart(), Err(SessionError::Validation(_))));
        let (mut s, t) = configured(TypePreference::Coding);
        s.finish_generation(t, Ok(coding_challenge("q", "h")));
        let t = s.restart().unwrap();
        assert!(s.snapshot().challenge.is_none());
        assert_eq!(t.request.topic, "Bubble Sort");
    }
}
