//! Bulk invitation: validate a roster, then send one invitation at a time
//! and record how each one came back.

pub mod machine;
pub mod outcome;
pub mod sender;
pub mod validate;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::api::types::ExamPaper;
use crate::error::{ConsoleError, Result};
use crate::roster::{RecipientEntry, RecipientId};
use crate::session::Session;

pub use machine::{
    continuation, transition, Continuation, Reply, RunEvent, RunState, TransitionError,
    FAILURE_POLICY,
};
pub use outcome::{DispatchOutcome, IllegalTransition, StatusProjection};
pub use sender::{FailureClass, InvitationRequest, InvitationSender, SendFailure};
pub use validate::{is_valid_email, validate_roster, ValidationFailure, ValidationReason};

/// A candidate the backend already knew about. The user has to acknowledge
/// these before the run counts as settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictNotice {
    pub recipient: RecipientId,
    pub email: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub succeeded: usize,
    pub conflicted: usize,
    pub unauthorized: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// Result of one dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub paper_id: u64,
    pub final_state: RunState,
    pub projection: StatusProjection,
    pub recipients: usize,
    pub calls_issued: usize,
    conflicts: Vec<ConflictNotice>,
    acknowledged: bool,
}

impl DispatchReport {
    fn new(paper_id: u64, recipients: usize) -> Self {
        Self {
            paper_id,
            final_state: RunState::Validating,
            projection: StatusProjection::new(),
            recipients,
            calls_issued: 0,
            conflicts: Vec::new(),
            acknowledged: false,
        }
    }

    pub fn halted_by_authorization(&self) -> bool {
        self.final_state == RunState::HaltedAuth
    }

    pub fn conflicts(&self) -> &[ConflictNotice] {
        &self.conflicts
    }

    pub fn requires_acknowledgment(&self) -> bool {
        !self.conflicts.is_empty() && !self.acknowledged
    }

    pub fn acknowledge_conflicts(&mut self) {
        self.acknowledged = true;
    }

    /// Finished, with every conflict notice acknowledged.
    pub fn is_settled(&self) -> bool {
        !self.final_state.is_running() && !self.requires_acknowledgment()
    }

    pub fn summary(&self) -> DispatchSummary {
        let mut summary = DispatchSummary {
            not_attempted: self.recipients - self.projection.len(),
            ..Default::default()
        };
        for (_, outcome) in self.projection.iter() {
            match outcome {
                DispatchOutcome::Succeeded => summary.succeeded += 1,
                DispatchOutcome::Conflict { .. } => summary.conflicted += 1,
                DispatchOutcome::Unauthorized => summary.unauthorized += 1,
                DispatchOutcome::Failed { .. } => summary.failed += 1,
                DispatchOutcome::Pending | DispatchOutcome::InFlight => {}
            }
        }
        summary
    }
}

/// Drives dispatch runs against an [`InvitationSender`].
///
/// The dispatcher is the only writer of the status projection; any number of
/// readers can follow it through [`Dispatcher::subscribe`]. Runs take
/// `&mut self`, so two runs on one dispatcher cannot overlap.
pub struct Dispatcher<S> {
    sender: S,
    state: RunState,
    projection_tx: watch::Sender<StatusProjection>,
}

impl<S: InvitationSender> Dispatcher<S> {
    pub fn new(sender: S) -> Self {
        let (projection_tx, _) = watch::channel(StatusProjection::new());
        Self {
            sender,
            state: RunState::Idle,
            projection_tx,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Live view of the current run's projection.
    pub fn subscribe(&self) -> watch::Receiver<StatusProjection> {
        self.projection_tx.subscribe()
    }

    fn apply(&mut self, event: RunEvent) -> Result<()> {
        self.state = transition(self.state, event)?;
        Ok(())
    }

    fn record(
        &self,
        projection: &mut StatusProjection,
        id: RecipientId,
        outcome: DispatchOutcome,
    ) -> Result<()> {
        projection.advance(id, outcome)?;
        self.projection_tx.send_replace(projection.clone());
        Ok(())
    }

    /// Run one dispatch over `roster` for `paper`.
    ///
    /// Returns [`ConsoleError::Validation`] without sending anything if any
    /// row is invalid. Otherwise sends to each recipient in order, stopping
    /// early only when the session is refused. An internal error returns the
    /// dispatcher to `Idle` so the next run can start.
    pub async fn dispatch(
        &mut self,
        session: &Session,
        paper: &ExamPaper,
        roster: &[RecipientEntry],
    ) -> Result<DispatchReport> {
        self.apply(RunEvent::Start)?;
        self.projection_tx.send_replace(StatusProjection::new());

        if let Err(failures) = validate_roster(roster) {
            self.apply(RunEvent::ValidationFailed)?;
            tracing::warn!(
                paper_id = paper.id,
                failures = failures.len(),
                "Roster failed validation, nothing sent"
            );
            return Err(ConsoleError::Validation(failures));
        }
        self.apply(RunEvent::ValidationPassed {
            recipients: roster.len(),
        })?;

        match self.send_all(session, paper, roster).await {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(paper_id = paper.id, error = %e, "Dispatch run aborted");
                self.apply(RunEvent::Aborted)?;
                Err(e)
            }
        }
    }

    async fn send_all(
        &mut self,
        session: &Session,
        paper: &ExamPaper,
        roster: &[RecipientEntry],
    ) -> Result<DispatchReport> {
        tracing::info!(
            paper_id = paper.id,
            paper = %paper.paper_name,
            recipients = roster.len(),
            "Starting dispatch run"
        );

        let mut report = DispatchReport::new(paper.id, roster.len());
        let mut projection = StatusProjection::new();

        while let RunState::InFlight { index, .. } = self.state {
            let entry = &roster[index];
            self.record(&mut projection, entry.id, DispatchOutcome::InFlight)?;

            let request = InvitationRequest::for_recipient(entry);
            report.calls_issued += 1;
            let result = self
                .sender
                .send_invitation(session, paper.id, &request)
                .await;

            let (outcome, reply) = match result {
                Ok(()) => {
                    tracing::debug!(recipient_id = %entry.id, email = %request.email, "Invitation sent");
                    (DispatchOutcome::Succeeded, Reply::Delivered)
                }
                Err(failure) => {
                    let outcome = match failure.class {
                        FailureClass::AuthorizationDenied => {
                            tracing::warn!(
                                recipient_id = %entry.id,
                                message = %failure.message,
                                "Session not authorized to send, halting run"
                            );
                            DispatchOutcome::Unauthorized
                        }
                        FailureClass::AlreadyExists => {
                            tracing::warn!(
                                recipient_id = %entry.id,
                                email = %request.email,
                                created_at = ?failure.created_at,
                                "Candidate already exists"
                            );
                            report.conflicts.push(ConflictNotice {
                                recipient: entry.id,
                                email: request.email.clone(),
                                message: failure.message.clone(),
                                created_at: failure.created_at,
                            });
                            DispatchOutcome::Conflict {
                                created_at: failure.created_at,
                            }
                        }
                        FailureClass::Other => {
                            tracing::warn!(
                                recipient_id = %entry.id,
                                error = %failure.message,
                                "Invitation failed"
                            );
                            DispatchOutcome::Failed {
                                reason: failure.message.clone(),
                            }
                        }
                    };
                    (outcome, Reply::Rejected(failure.class))
                }
            };

            self.record(&mut projection, entry.id, outcome)?;
            self.apply(RunEvent::Replied(reply))?;
        }

        report.final_state = self.state;
        report.projection = projection;

        let summary = report.summary();
        tracing::info!(
            paper_id = paper.id,
            calls = report.calls_issued,
            succeeded = summary.succeeded,
            conflicted = summary.conflicted,
            failed = summary.failed,
            halted = report.halted_by_authorization(),
            "Dispatch run finished"
        );

        Ok(report)
    }
}
