use std::collections::HashSet;

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use tower_sessions::Session;

use crate::{
    auth::Authentication,
    csrf::CsrfToken,
    error::{AppError, AppResult},
    models::Snippet,
};

/// Session key for one-shot messages shown on the next rendered page.
pub const FLASH_SESSION_KEY: &str = "flash";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("page {0:?} does not exist")]
    UnknownPage(String),

    #[error("page data could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// PageRenderer
///
/// Turns a page key plus its data into a complete response. The status is only applied
/// once the body has been produced in full, so a failing page never half-writes.
pub trait PageRenderer: Send + Sync {
    fn render(&self, status: StatusCode, page: &str, data: &TemplateData) -> Result<Response, RenderError>;
}

pub type RendererState = std::sync::Arc<dyn PageRenderer>;

/// TemplateData
///
/// Everything a page may display.
#[derive(Debug, Default, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    pub snippet: Option<SnippetView>,
    pub snippets: Vec<SnippetView>,
    pub form: Option<serde_json::Value>,
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
}

/// A snippet together with its human-readable dates.
#[derive(Debug, Clone, Serialize)]
pub struct SnippetView {
    #[serde(flatten)]
    pub snippet: Snippet,
    pub created_display: String,
    pub expires_display: String,
}

impl From<Snippet> for SnippetView {
    fn from(snippet: Snippet) -> Self {
        Self {
            created_display: human_date(snippet.created),
            expires_display: human_date(snippet.expires),
            snippet,
        }
    }
}

/// Formats a timestamp as `02 Jan 2006 at 15:04` in UTC.
pub fn human_date(t: DateTime<Utc>) -> String {
    t.format("%d %b %Y at %H:%M").to_string()
}

/// PageContext
///
/// The per-request inputs every rendered page needs: the session (for the flash message),
/// the gate's verdict and the CSRF token.
#[derive(Clone)]
pub struct PageContext {
    pub session: Session,
    pub authentication: Authentication,
    pub csrf_token: CsrfToken,
}

impl PageContext {
    /// Builds the common page data. Reading the flash message consumes it.
    pub async fn template_data(&self, now: DateTime<Utc>) -> AppResult<TemplateData> {
        Ok(TemplateData {
            current_year: now.year(),
            flash: self.session.remove::<String>(FLASH_SESSION_KEY).await?,
            is_authenticated: self.authentication.is_authenticated(),
            csrf_token: self.csrf_token.0.clone(),
            ..TemplateData::default()
        })
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::SessionUnavailable)?;
        let authentication = parts
            .extensions
            .get::<Authentication>()
            .copied()
            .unwrap_or_default();
        let csrf_token = parts.extensions.get::<CsrfToken>().cloned().unwrap_or_default();

        Ok(Self {
            session,
            authentication,
            csrf_token,
        })
    }
}

// --- JSON rendering ---

pub const PAGES: [&str; 5] = ["home", "view", "create", "signup", "login"];

#[derive(Serialize)]
struct RenderedPage<'a> {
    page: &'a str,
    #[serde(flatten)]
    data: &'a TemplateData,
}

/// JsonRenderer
///
/// Renders each page as its JSON data document. Only the registered page keys exist;
/// asking for any other is an error, just as a missing template would be.
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    pages: HashSet<String>,
}

impl JsonRenderer {
    pub fn new<I, P>(pages: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for JsonRenderer {
    fn default() -> Self {
        Self::new(PAGES)
    }
}

impl PageRenderer for JsonRenderer {
    fn render(&self, status: StatusCode, page: &str, data: &TemplateData) -> Result<Response, RenderError> {
        if !self.pages.contains(page) {
            return Err(RenderError::UnknownPage(page.to_owned()));
        }

        let body = serde_json::to_vec(&RenderedPage { page, data })?;

        Ok((
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            body,
        )
            .into_response())
    }
}
