use thiserror::Error;

use crate::dispatch::{IllegalTransition, TransitionError, ValidationFailure};

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Not logged in, run `exam-invite login` first")]
    NotAuthenticated,

    #[error("Role {role} may not open {route}")]
    Forbidden { role: String, route: String },

    #[error("Login failed: the received authentication info is invalid ({0})")]
    InvalidToken(String),

    #[error("Login failed: user information is incomplete (missing {0})")]
    IncompleteClaims(&'static str),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Roster rejected: {}", format_failures(.0))]
    Validation(Vec<ValidationFailure>),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Projection(#[from] IllegalTransition),

    #[error("Recipient not found: {0}")]
    RecipientNotFound(u64),

    #[error("The roster must keep at least one row")]
    LastRecipient,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn format_failures(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
