use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::roster::{RecipientEntry, RecipientId};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    EmptyName,
    MalformedEmail,
    /// Another row earlier in the roster carries the same id.
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub recipient: RecipientId,
    /// 1-based row number as shown to the user.
    pub row: usize,
    pub reason: ValidationReason,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            ValidationReason::EmptyName => {
                write!(f, "candidate {} (id {}) has no name", self.row, self.recipient)
            }
            ValidationReason::MalformedEmail => write!(
                f,
                "candidate {} (id {}) has a malformed email address",
                self.row, self.recipient
            ),
            ValidationReason::DuplicateId => write!(
                f,
                "candidate {} reuses id {} of an earlier row",
                self.row, self.recipient
            ),
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Check every row before anything is sent. Returns every problem found, not
/// just the first. Surrounding whitespace in the email is ignored, as it is
/// trimmed before sending.
pub fn validate_roster(entries: &[RecipientEntry]) -> Result<(), Vec<ValidationFailure>> {
    let mut failures = Vec::new();
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        if !seen.insert(entry.id) {
            failures.push(ValidationFailure {
                recipient: entry.id,
                row: index + 1,
                reason: ValidationReason::DuplicateId,
            });
        }
        if entry.display_name.trim().is_empty() {
            failures.push(ValidationFailure {
                recipient: entry.id,
                row: index + 1,
                reason: ValidationReason::EmptyName,
            });
        }
        if !is_valid_email(entry.email.trim()) {
            failures.push(ValidationFailure {
                recipient: entry.id,
                row: index + 1,
                reason: ValidationReason::MalformedEmail,
            });
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}
