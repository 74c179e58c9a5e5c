use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::roster::RecipientId;

/// Where one recipient stands within the current dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Pending,
    InFlight,
    Succeeded,
    /// The backend already knows this candidate.
    Conflict {
        created_at: Option<DateTime<Utc>>,
    },
    Unauthorized,
    Failed {
        reason: String,
    },
}

impl DispatchOutcome {
    fn stage(&self) -> u8 {
        match self {
            DispatchOutcome::Pending => 0,
            DispatchOutcome::InFlight => 1,
            _ => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage() == 2
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Pending => write!(f, "pending"),
            DispatchOutcome::InFlight => write!(f, "sending..."),
            DispatchOutcome::Succeeded => write!(f, "sent"),
            DispatchOutcome::Conflict {
                created_at: Some(at),
            } => write!(f, "already invited ({})", at.format("%Y-%m-%d %H:%M")),
            DispatchOutcome::Conflict { created_at: None } => write!(f, "already invited"),
            DispatchOutcome::Unauthorized => write!(f, "not authorized"),
            DispatchOutcome::Failed { reason } => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("recipient {recipient}: outcome cannot move from {from} to {to}")]
pub struct IllegalTransition {
    pub recipient: RecipientId,
    pub from: DispatchOutcome,
    pub to: DispatchOutcome,
}

/// Per-recipient outcomes for one dispatch run.
///
/// Only attempted recipients have an entry; everyone else reads as
/// [`DispatchOutcome::Pending`]. Entries move strictly
/// `Pending -> InFlight -> terminal`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusProjection {
    outcomes: BTreeMap<RecipientId, DispatchOutcome>,
}

impl StatusProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outcome(&self, id: RecipientId) -> DispatchOutcome {
        self.outcomes
            .get(&id)
            .cloned()
            .unwrap_or(DispatchOutcome::Pending)
    }

    pub fn advance(
        &mut self,
        id: RecipientId,
        next: DispatchOutcome,
    ) -> Result<(), IllegalTransition> {
        let current = self.outcome(id);
        if next.stage() != current.stage() + 1 {
            return Err(IllegalTransition {
                recipient: id,
                from: current,
                to: next,
            });
        }
        self.outcomes.insert(id, next);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecipientId, &DispatchOutcome)> {
        self.outcomes.iter().map(|(id, outcome)| (*id, outcome))
    }

    /// Number of recipients that have been attempted so far.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_recipient_reads_pending() {
        let projection = StatusProjection::new();
        assert_eq!(projection.outcome(RecipientId(7)), DispatchOutcome::Pending);
        assert!(projection.is_empty());
    }

    #[test]
    fn forward_transitions_are_accepted() {
        let mut projection = StatusProjection::new();
        let id = RecipientId(1);
        projection.advance(id, DispatchOutcome::InFlight).unwrap();
        projection
            .advance(id, DispatchOutcome::Conflict { created_at: None })
            .unwrap();
        assert_eq!(
            projection.outcome(id),
            DispatchOutcome::Conflict { created_at: None }
        );
        assert_eq!(projection.len(), 1);
    }

    #[test]
    fn skipping_in_flight_is_rejected() {
        let mut projection = StatusProjection::new();
        let err = projection
            .advance(RecipientId(1), DispatchOutcome::Succeeded)
            .unwrap_err();
        assert_eq!(err.from, DispatchOutcome::Pending);
        assert_eq!(err.to, DispatchOutcome::Succeeded);
        assert!(projection.is_empty());
    }

    #[test]
    fn terminal_outcomes_never_change() {
        let mut projection = StatusProjection::new();
        let id = RecipientId(1);
        projection.advance(id, DispatchOutcome::InFlight).unwrap();
        projection.advance(id, DispatchOutcome::Unauthorized).unwrap();

        assert!(projection.advance(id, DispatchOutcome::Succeeded).is_err());
        assert!(projection.advance(id, DispatchOutcome::InFlight).is_err());
        assert!(projection.advance(id, DispatchOutcome::Pending).is_err());
        assert_eq!(projection.outcome(id), DispatchOutcome::Unauthorized);
    }

    #[test]
    fn display_labels() {
        assert_eq!(DispatchOutcome::InFlight.to_string(), "sending...");
        assert_eq!(
            DispatchOutcome::Failed {
                reason: "timeout".into()
            }
            .to_string(),
            "failed: timeout"
        );
        let at = DateTime::parse_from_rfc3339("2025-08-15T14:15:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            DispatchOutcome::Conflict {
                created_at: Some(at)
            }
            .to_string(),
            "already invited (2025-08-15 14:15)"
        );
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(DispatchOutcome::Failed {
            reason: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");
    }
}
