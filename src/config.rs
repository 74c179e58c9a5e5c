use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConsoleError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Page sizes for the candidate tables.
///
/// The overview card shows a short excerpt; the detail and PMO tables show a
/// full page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub overview: u32,
    pub detail: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            overview: 5,
            detail: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Backend root, without a trailing slash.
    pub base_url: String,
    /// Where the session token is persisted between invocations.
    pub session_path: PathBuf,
    /// Transport timeout applied by the HTTP client to every request.
    pub request_timeout: Duration,
    pub page_sizes: PageSizes,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_path: default_session_path(),
            request_timeout: Duration::from_secs(30),
            page_sizes: PageSizes::default(),
        }
    }
}

impl ConsoleConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_session_path(mut self, path: PathBuf) -> Self {
        self.session_path = path;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_page_sizes(mut self, page_sizes: PageSizes) -> Self {
        self.page_sizes = page_sizes;
        self
    }

    /// Base URL with any trailing slashes removed, ready for path joining.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        let root = self.api_root();
        if root.is_empty() {
            return Err(ConsoleError::Config("base URL is empty".to_string()));
        }
        if !(root.starts_with("http://") || root.starts_with("https://")) {
            return Err(ConsoleError::Config(format!(
                "base URL must start with http:// or https://, got {root}"
            )));
        }
        if self.page_sizes.overview == 0 || self.page_sizes.detail == 0 {
            return Err(ConsoleError::Config(
                "page sizes must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ConsoleError::Config(
                "request timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_session_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".exam-invite").join("session"),
        None => PathBuf::from(".exam-invite-session"),
    }
}
