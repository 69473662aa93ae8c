//! Query form state and the request/response flow.
//!
//! Submission is split in three so the UI task never waits on the model:
//! [`Oracle::begin_submit`] validates and hands out a [`Ticket`],
//! [`Ticket::execute`] talks to the capability (spawned elsewhere), and
//! [`Oracle::apply`] folds the [`Outcome`] back into state. Only the outcome
//! of the most recently dispatched ticket is applied.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::capability::{Capability, SessionFactory};
use crate::error::{CapabilityError, OracleError};

pub struct Oracle {
    capability: Capability,
    query: String,
    response: String,
    error: Option<OracleError>,
    generation: u64,
    pending: Option<u64>,
}

/// What a submission attempt turned into.
pub enum Submission {
    /// Blank query; nothing happened.
    Ignored,
    /// Refused before any request was made; the error is now set.
    Rejected(OracleError),
    /// A request must be run; feed its outcome to [`Oracle::apply`].
    Dispatched(Ticket),
}

/// A request bound to one generation.
pub struct Ticket {
    generation: u64,
    query: String,
    factory: Arc<dyn SessionFactory>,
}

#[derive(Debug)]
pub struct Outcome {
    generation: u64,
    result: Result<String, CapabilityError>,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn execute(self) -> Outcome {
        let result = async {
            debug!(generation = self.generation, "creating text session");
            let session = self.factory.create_session().await?;
            debug!(generation = self.generation, "prompting");
            session.prompt(&self.query).await
        }
        .await;
        Outcome {
            generation: self.generation,
            result,
        }
    }
}

impl Outcome {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Oracle {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            query: String::new(),
            response: String::new(),
            error: None,
            generation: 0,
            pending: None,
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn error(&self) -> Option<OracleError> {
        self.error
    }

    /// The error paragraph text, empty when there is none.
    pub fn error_message(&self) -> String {
        self.error.map(|e| e.to_string()).unwrap_or_default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn on_input_change(&mut self, text: impl Into<String>) {
        self.query = text.into();
    }

    pub fn begin_submit(&mut self) -> Submission {
        self.error = None;

        if self.query.trim().is_empty() {
            return Submission::Ignored;
        }

        let Some(factory) = self.capability.factory() else {
            info!("submission refused: capability unavailable");
            self.error = Some(OracleError::Unavailable);
            return Submission::Rejected(OracleError::Unavailable);
        };

        self.generation += 1;
        self.pending = Some(self.generation);
        info!(generation = self.generation, chars = self.query.chars().count(), "query dispatched");

        Submission::Dispatched(Ticket {
            generation: self.generation,
            query: self.query.clone(),
            factory,
        })
    }

    /// Returns whether the outcome was applied. Outcomes from superseded
    /// tickets are dropped.
    pub fn apply(&mut self, outcome: Outcome) -> bool {
        if outcome.generation != self.generation {
            debug!(
                generation = outcome.generation,
                latest = self.generation,
                "dropping stale outcome"
            );
            return false;
        }
        self.pending = None;

        match outcome.result {
            Ok(text) => {
                info!(generation = outcome.generation, chars = text.chars().count(), "response received");
                self.response = text;
            }
            Err(e) => {
                error!(generation = outcome.generation, error = %e, "request failed");
                self.error = Some(OracleError::from(e));
            }
        }
        true
    }

    /// Run a whole submission inline.
    pub async fn submit(&mut self) {
        if let Submission::Dispatched(ticket) = self.begin_submit() {
            let outcome = ticket.execute().await;
            self.apply(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::testing::{Behaviour, FakeHost};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn oracle_with(behaviour: Behaviour) -> (Oracle, Arc<AtomicUsize>) {
        let (host, calls) = FakeHost::new(behaviour);
        (Oracle::new(Capability::available(host)), calls)
    }

    const UNAVAILABLE: &str = "The AI feature is not available in your browser.";
    const FAILED: &str = "Failed to create session or retrieve response. Please try again.";

    #[tokio::test]
    async fn blank_query_is_a_silent_no_op() {
        let (mut oracle, calls) = oracle_with(Behaviour::Answer("42"));
        for blank in ["", "   ", "\t\n"] {
            oracle.on_input_change(blank);
            oracle.submit().await;
            assert_eq!(oracle.response(), "");
            assert_eq!(oracle.error_message(), "");
            assert!(!oracle.is_pending());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unavailable_capability_sets_fixed_message() {
        let mut oracle = Oracle::new(Capability::Unavailable);
        oracle.on_input_change("hello");
        oracle.submit().await;
        assert_eq!(oracle.error_message(), UNAVAILABLE);
        assert_eq!(oracle.error(), Some(OracleError::Unavailable));
        assert_eq!(oracle.response(), "");
    }

    #[test]
    fn unavailable_capability_never_dispatches() {
        let mut oracle = Oracle::new(Capability::Unavailable);
        oracle.on_input_change("hello");
        assert!(matches!(
            oracle.begin_submit(),
            Submission::Rejected(OracleError::Unavailable)
        ));
        assert!(!oracle.is_pending());
    }

    #[tokio::test]
    async fn success_stores_response_verbatim() {
        let (mut oracle, calls) = oracle_with(Behaviour::Answer("42"));
        oracle.on_input_change("what is the answer?");
        oracle.submit().await;
        assert_eq!(oracle.response(), "42");
        assert_eq!(oracle.error_message(), "");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn query_is_sent_untrimmed() {
        let (mut oracle, _) = oracle_with(Behaviour::Echo);
        oracle.on_input_change("  why?  ");
        oracle.submit().await;
        assert_eq!(oracle.response(), "  why?  ");
    }

    #[tokio::test]
    async fn session_failure_sets_fixed_message() {
        let (mut oracle, _) = oracle_with(Behaviour::FailSession);
        oracle.on_input_change("hello");
        oracle.submit().await;
        assert_eq!(oracle.error_message(), FAILED);
        assert!(!oracle.is_pending());
    }

    #[tokio::test]
    async fn prompt_failure_sets_fixed_message() {
        let (mut oracle, _) = oracle_with(Behaviour::FailPrompt);
        oracle.on_input_change("hello");
        oracle.submit().await;
        assert_eq!(oracle.error_message(), FAILED);
    }

    #[tokio::test]
    async fn every_submission_clears_previous_error() {
        let mut oracle = Oracle::new(Capability::Unavailable);
        oracle.on_input_change("hello");
        oracle.submit().await;
        assert_eq!(oracle.error_message(), UNAVAILABLE);

        oracle.on_input_change("   ");
        oracle.submit().await;
        assert_eq!(oracle.error_message(), "");
    }

    #[tokio::test]
    async fn failure_after_success_keeps_stale_response() {
        let (mut oracle, _) = oracle_with(Behaviour::Answer("first"));
        oracle.on_input_change("one");
        oracle.submit().await;
        assert_eq!(oracle.response(), "first");

        // Swap to a failing host; the earlier response stays on screen.
        oracle.capability = Capability::available(FakeHost::new(Behaviour::FailPrompt).0);
        oracle.on_input_change("two");
        oracle.submit().await;
        assert_eq!(oracle.response(), "first");
        assert_eq!(oracle.error_message(), FAILED);
    }

    #[tokio::test]
    async fn stale_outcome_is_dropped() {
        let (mut oracle, _) = oracle_with(Behaviour::Echo);

        oracle.on_input_change("older");
        let Submission::Dispatched(first) = oracle.begin_submit() else {
            panic!("expected dispatch");
        };
        oracle.on_input_change("newer");
        let Submission::Dispatched(second) = oracle.begin_submit() else {
            panic!("expected dispatch");
        };
        assert!(second.generation() > first.generation());

        // The newer request resolves first, the older one last.
        let newer = second.execute().await;
        let older = first.execute().await;
        assert!(oracle.apply(newer));
        assert!(!oracle.is_pending());
        assert!(!oracle.apply(older));
        assert_eq!(oracle.response(), "newer");
    }

    #[tokio::test]
    async fn pending_until_latest_outcome_arrives() {
        let (mut oracle, _) = oracle_with(Behaviour::Answer("42"));
        oracle.on_input_change("hello");
        let Submission::Dispatched(ticket) = oracle.begin_submit() else {
            panic!("expected dispatch");
        };
        assert!(oracle.is_pending());
        let outcome = ticket.execute().await;
        assert_eq!(outcome.generation(), 1);
        oracle.apply(outcome);
        assert!(!oracle.is_pending());
        assert_eq!(oracle.response(), "42");
    }
}
