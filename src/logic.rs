//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! An intent is applied in two steps. `start` locks the session, runs the
//! transition, publishes and unlocks. If the transition needs the provider it
//! returns a `Pending` call. `resolve` awaits that call without holding the lock,
//! then hands the result back to the session, which drops it if it went stale.
//! HTTP runs both steps inline through `apply`. The WebSocket loop runs `start`
//! in arrival order and spawns `resolve`.

use tracing::{debug, error, info, instrument};

use crate::domain::{ConfigDraft, Difficulty, QuestionType};
use crate::error::{Phase, ProviderError, SessionError};
use crate::providers::{self, GenerationRequest, GradingRequest, HintRequest, SolutionRequest};
use crate::session::{ChallengeSession, Resolution, SessionView, Ticket};
use crate::state::{AppState, SessionHandle};

/// User intent raised by a client surface.
#[derive(Debug, Clone)]
pub enum Intent {
  Configure(ConfigDraft),
  Restart,
  SwitchView(QuestionType),
  UpdateDraft(String),
  Submit,
  RevealSolution,
  RevealHint,
}

/// Provider call still owed after a transition.
#[derive(Debug)]
pub enum Pending {
  Generation(Ticket<GenerationRequest>),
  Grading(Ticket<GradingRequest>),
  Solution(Ticket<SolutionRequest>),
  Hint(Ticket<HintRequest>),
}

impl Pending {
  pub fn phase(&self) -> Phase {
    match self {
      Pending::Generation(_) => Phase::Generation,
      Pending::Grading(_) => Phase::Grading,
      Pending::Solution(_) => Phase::Solution,
      Pending::Hint(_) => Phase::Hint,
    }
  }
}

/// Run `intent` to completion, provider call included.
pub async fn apply(state: &AppState, handle: &SessionHandle, intent: Intent) -> Result<SessionView, SessionError> {
  let (view, pending) = start(handle, intent).await?;
  match pending {
    Some(p) => Ok(resolve(state, handle, p).await),
    None => Ok(view),
  }
}

/// Apply the synchronous part of `intent`. The snapshot is published even when
/// the transition is rejected, so clients see the validation message.
#[instrument(level = "debug", skip(handle), fields(id = %handle.id()))]
pub async fn start(handle: &SessionHandle, intent: Intent) -> Result<(SessionView, Option<Pending>), SessionError> {
  let mut s = handle.lock().await;
  let outcome = transition(&mut s, intent);
  let view = handle.publish(&s);
  if let Err(e) = &outcome {
    debug!(target: "session", id = %handle.id(), error = %e, "Intent rejected");
  }
  outcome.map(|pending| (view, pending))
}

fn transition(s: &mut ChallengeSession, intent: Intent) -> Result<Option<Pending>, SessionError> {
  Ok(match intent {
    Intent::Configure(update) => s.configure(update).map(Pending::Generation),
    Intent::Restart => Some(Pending::Generation(s.restart()?)),
    Intent::SwitchView(view) => {
      if s.switch_view(view)? {
        debug!(target: "session", id = %s.id(), %view, "Active view switched");
      }
      None
    }
    Intent::UpdateDraft(text) => {
      s.update_draft(text)?;
      None
    }
    Intent::Submit => Some(Pending::Grading(s.begin_submission()?)),
    Intent::RevealSolution => Some(Pending::Solution(s.begin_solution()?)),
    Intent::RevealHint => s.reveal_hint()?.map(Pending::Hint),
  })
}

/// Await the provider for `pending` and settle the result into the session.
#[instrument(level = "info", skip(state, handle, pending), fields(id = %handle.id(), phase = %pending.phase(), provider = state.provider.name()))]
pub async fn resolve(state: &AppState, handle: &SessionHandle, pending: Pending) -> SessionView {
  let provider = state.provider.as_ref();
  match pending {
    Pending::Generation(t) => {
      let r = &t.request;
      info!(target: "session", id = %handle.id(), topic = %r.topic, difficulty = %r.difficulty, preference = r.type_preference.as_wire(), "Requesting challenge");
      let result = provider.generate_challenge(r).await;
      settle(handle, Phase::Generation, t, result, ChallengeSession::finish_generation).await
    }
    Pending::Grading(t) => {
      let view = t.request.view();
      info!(target: "session", id = %handle.id(), %view, "Submitting for grading");
      let result = providers::grade(provider, &t.request).await;
      if let Ok(g) = &result {
        info!(target: "session", id = %handle.id(), %view, score = g.score, passed = g.passed, "Submission graded");
      }
      settle(handle, Phase::Grading, t, result, ChallengeSession::finish_submission).await
    }
    Pending::Solution(t) => {
      let result = provider.generate_solution(&t.request).await;
      settle(handle, Phase::Solution, t, result, ChallengeSession::finish_solution).await
    }
    Pending::Hint(t) => {
      let result = provider.generate_hint(&t.request).await;
      settle(handle, Phase::Hint, t, result, ChallengeSession::finish_hint).await
    }
  }
}

/// Stateless: does not touch any session.
#[instrument(level = "info", skip(state), fields(%difficulty))]
pub async fn suggest_topic(state: &AppState, difficulty: Difficulty) -> Result<String, ProviderError> {
  let topic = state.provider.suggest_topic(difficulty).await;
  match &topic {
    Ok(t) => info!(target: "codecrafter", %difficulty, topic = %t, "Topic suggested"),
    Err(e) => error!(target: "codecrafter", %difficulty, error = %e, "Topic suggestion failed"),
  }
  topic
}

/// Hand a provider result back to the session and publish if it was applied.
async fn settle<R, T>(
  handle: &SessionHandle,
  phase: Phase,
  ticket: Ticket<R>,
  result: Result<T, ProviderError>,
  finish: impl FnOnce(&mut ChallengeSession, Ticket<R>, Result<T, ProviderError>) -> Resolution,
) -> SessionView {
  if let Err(e) = &result {
    error!(target: "session", id = %handle.id(), %phase, error = %e, "Provider call failed");
  }
  let mut s = handle.lock().await;
  match finish(&mut *s, ticket, result) {
    Resolution::Applied => handle.publish(&s),
    Resolution::Stale => {
      info!(target: "session", id = %handle.id(), %phase, "Discarded stale provider result");
      s.snapshot()
    }
  }
}
