pub mod access;
pub mod api;
pub mod candidates;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod error;
pub mod roster;
pub mod session;
