//! Account dashboard: balance, candidate counts and the account profile,
//! fetched concurrently. One card failing never hides the others.

use serde::Serialize;

use crate::api::types::{AccountBalance, UserInfo};
use crate::api::ApiClient;
use crate::error::Result;
use crate::session::Session;

pub const USER_INFO_UNAVAILABLE: &str = "Unable to load user information";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub balance: Option<f64>,
    pub untested: Option<u64>,
    pub progressing: Option<u64>,
    pub user: Option<UserInfo>,
    /// Cards that could not be loaded; they render as placeholders.
    pub warnings: Vec<String>,
    /// Set when the account profile is unavailable.
    pub error: Option<String>,
}

impl DashboardSnapshot {
    pub fn from_results(
        balance: Result<Option<AccountBalance>>,
        untested: Result<Option<u64>>,
        progressing: Result<Option<u64>>,
        user: Result<Option<UserInfo>>,
    ) -> Self {
        let mut snapshot = Self::default();

        match balance {
            Ok(b) => snapshot.balance = b.map(|b| b.money),
            Err(e) => snapshot.warnings.push(format!("balance: {e}")),
        }
        match untested {
            Ok(n) => snapshot.untested = n,
            Err(e) => snapshot.warnings.push(format!("untested count: {e}")),
        }
        match progressing {
            Ok(n) => snapshot.progressing = n,
            Err(e) => snapshot.warnings.push(format!("in-progress count: {e}")),
        }
        match user {
            Ok(Some(info)) => snapshot.user = Some(info),
            Ok(None) => snapshot.error = Some(USER_INFO_UNAVAILABLE.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load user info");
                snapshot.error = Some(USER_INFO_UNAVAILABLE.to_string());
            }
        }

        snapshot
    }
}

pub async fn load(client: &ApiClient, session: &Session) -> DashboardSnapshot {
    let (balance, untested, progressing, user) = tokio::join!(
        client.fetch_balance(session),
        client.fetch_untested_count(session),
        client.fetch_progressing_count(session),
        client.fetch_user_info(session),
    );
    let snapshot = DashboardSnapshot::from_results(balance, untested, progressing, user);
    if !snapshot.warnings.is_empty() {
        tracing::debug!(warnings = ?snapshot.warnings, "Dashboard loaded partially");
    }
    snapshot
}

/// Placeholder for a card that did not load.
pub fn card<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "...".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;

    fn api_error(message: &str) -> ConsoleError {
        ConsoleError::Api {
            status: 500,
            message: message.to_string(),
        }
    }

    #[test]
    fn all_cards_loaded() {
        let snapshot = DashboardSnapshot::from_results(
            Ok(Some(AccountBalance { money: 120.5 })),
            Ok(Some(3)),
            Ok(Some(7)),
            Ok(Some(UserInfo {
                company_name: Some("Acme".into()),
                ..Default::default()
            })),
        );
        assert_eq!(snapshot.balance, Some(120.5));
        assert_eq!(snapshot.untested, Some(3));
        assert_eq!(snapshot.progressing, Some(7));
        assert!(snapshot.warnings.is_empty());
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn one_failed_card_leaves_the_rest() {
        let snapshot = DashboardSnapshot::from_results(
            Err(api_error("billing down")),
            Ok(Some(3)),
            Ok(Some(7)),
            Ok(Some(UserInfo::default())),
        );
        assert_eq!(snapshot.balance, None);
        assert_eq!(snapshot.untested, Some(3));
        assert_eq!(snapshot.warnings.len(), 1);
        assert!(snapshot.warnings[0].contains("billing down"));
        assert!(snapshot.error.is_none());
        assert_eq!(card(snapshot.balance), "...");
        assert_eq!(card(snapshot.untested), "3");
    }

    #[test]
    fn missing_user_info_is_an_error() {
        let snapshot = DashboardSnapshot::from_results(
            Ok(None),
            Ok(None),
            Ok(None),
            Err(api_error("boom")),
        );
        assert_eq!(snapshot.error.as_deref(), Some(USER_INFO_UNAVAILABLE));
        assert!(snapshot.warnings.is_empty());
    }
}
