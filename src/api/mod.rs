//! HTTP client for the recruitment backend.

pub mod types;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ConsoleConfig;
use crate::dispatch::{InvitationRequest, InvitationSender, SendFailure};
use crate::error::{ConsoleError, Result};
use crate::session::Session;
use types::{
    AccountBalance, ApiEnvelope, Candidate, ConflictData, ExamPaper, LoginRequest, LoginResponse,
    MessageResponse, Page, RegisterRequest, UserInfo,
};

const AUTH_DENIED_CODES: [&str; 3] = ["UNAUTHORIZED", "FORBIDDEN", "AUTHORIZATION_DENIED"];
const ALREADY_EXISTS_CODES: [&str; 2] = ["ALREADY_EXISTS", "CONFLICT"];

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            base_url: config.api_root().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Exchange credentials for a JWT. The caller decodes it into a
    /// [`Session`].
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/auth/login"))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<LoginResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.message)
                .unwrap_or_else(|| format!("login rejected with status {}", status.as_u16()));
            return Err(ConsoleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        match parsed.and_then(|r| r.jwt).filter(|jwt| !jwt.is_empty()) {
            Some(jwt) => Ok(jwt),
            None => Err(ConsoleError::Api {
                status: status.as_u16(),
                message: "login failed: no token received".to_string(),
            }),
        }
    }

    pub async fn register(&self, session: &Session, request: &RegisterRequest) -> Result<String> {
        let response = self
            .http
            .post(self.url("/api/auth/register"))
            .header(AUTHORIZATION, session.bearer())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let message = serde_json::from_str::<MessageResponse>(&body)
            .ok()
            .and_then(|r| r.message);

        if status.is_success() {
            Ok(message.unwrap_or_else(|| "User registered".to_string()))
        } else {
            Err(ConsoleError::Api {
                status: status.as_u16(),
                message: message.unwrap_or_else(|| format!("HTTP error! status: {}", status)),
            })
        }
    }

    /// GET an enveloped resource. `success: false` becomes an API error with
    /// the backend's message, or `fallback` when it sent none.
    async fn get_data<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        fallback: &str,
    ) -> Result<Option<T>> {
        tracing::debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .header(AUTHORIZATION, session.bearer())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let envelope = serde_json::from_str::<ApiEnvelope<T>>(&body);

        if !status.is_success() {
            let message = envelope
                .ok()
                .and_then(|e| e.message().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(ConsoleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope?;
        if !envelope.success {
            return Err(ConsoleError::Api {
                status: status.as_u16(),
                message: envelope.message().unwrap_or(fallback).to_string(),
            });
        }
        Ok(envelope.data)
    }

    pub async fn fetch_papers(&self, session: &Session) -> Result<Vec<ExamPaper>> {
        let papers = self
            .get_data(session, "/api/papers", "Failed to fetch papers from API")
            .await?;
        Ok(papers.unwrap_or_default())
    }

    pub async fn fetch_paper(&self, session: &Session, paper_id: u64) -> Result<ExamPaper> {
        self.fetch_papers(session)
            .await?
            .into_iter()
            .find(|p| p.id == paper_id)
            .ok_or_else(|| ConsoleError::Api {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("no exam paper with id {paper_id}"),
            })
    }

    /// `page` is 0-based.
    pub async fn fetch_candidates(
        &self,
        session: &Session,
        page: u32,
        size: u32,
    ) -> Result<Page<Candidate>> {
        let path = format!("/api/students?page={page}&size={size}");
        self.get_data(session, &path, "Failed to fetch candidates from API")
            .await?
            .ok_or_else(|| ConsoleError::Api {
                status: StatusCode::OK.as_u16(),
                message: "candidate page missing from response".to_string(),
            })
    }

    pub async fn fetch_balance(&self, session: &Session) -> Result<Option<AccountBalance>> {
        self.get_data(session, "/api/account/balance", "Failed to fetch balance")
            .await
    }

    pub async fn fetch_untested_count(&self, session: &Session) -> Result<Option<u64>> {
        self.get_data(
            session,
            "/api/students/untested-count",
            "Failed to fetch untested count",
        )
        .await
    }

    pub async fn fetch_progressing_count(&self, session: &Session) -> Result<Option<u64>> {
        self.get_data(
            session,
            "/api/students/progressing-count",
            "Failed to fetch progressing count",
        )
        .await
    }

    pub async fn fetch_user_info(&self, session: &Session) -> Result<Option<UserInfo>> {
        self.get_data(session, "/api/user/info", "Failed to fetch user info")
            .await
    }
}

/// Classify a send-exam reply. The backend answers most failures with
/// HTTP 200 and `success: false`, so both the status and the envelope's
/// `code` are consulted.
pub fn classify_send_reply(
    status: StatusCode,
    envelope: Option<ApiEnvelope<ConflictData>>,
) -> std::result::Result<(), SendFailure> {
    let code = envelope
        .as_ref()
        .and_then(|e| e.code.as_deref())
        .map(str::to_ascii_uppercase);
    let code = code.as_deref();
    let message = envelope
        .as_ref()
        .and_then(|e| e.message())
        .map(str::to_string);

    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || code.is_some_and(|c| AUTH_DENIED_CODES.contains(&c))
    {
        return Err(SendFailure::denied(message.unwrap_or_else(|| {
            "not authorized to send invitations".to_string()
        })));
    }

    if status == StatusCode::CONFLICT || code.is_some_and(|c| ALREADY_EXISTS_CODES.contains(&c)) {
        let created_at = envelope
            .and_then(|e| e.data)
            .and_then(|data| data.created_time);
        return Err(SendFailure::already_exists(
            message.unwrap_or_else(|| "candidate already exists".to_string()),
            created_at,
        ));
    }

    match envelope {
        Some(envelope) if status.is_success() && envelope.success => Ok(()),
        Some(_) => Err(SendFailure::other(message.unwrap_or_else(|| {
            format!("send failed with status {}", status.as_u16())
        }))),
        None => Err(SendFailure::other(format!(
            "unreadable response with status {}",
            status.as_u16()
        ))),
    }
}

#[async_trait]
impl InvitationSender for ApiClient {
    async fn send_invitation(
        &self,
        session: &Session,
        paper_id: u64,
        request: &InvitationRequest,
    ) -> std::result::Result<(), SendFailure> {
        let url = self.url(&format!("/api/send-exam/{paper_id}"));
        tracing::debug!(paper_id, email = %request.email, "POST send-exam");

        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, session.bearer())
            .header("Idempotency-Key", &request.idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(|e| SendFailure::other(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SendFailure::other(e.to_string()))?;
        let envelope = serde_json::from_str::<ApiEnvelope<ConflictData>>(&body).ok();

        classify_send_reply(status, envelope)
    }
}
