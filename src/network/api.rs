use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::auth::{AdminLoginResponse, Credentials, LoginRequest, LoginResponse, RegisterRequest};
use crate::catalog::models::ProductPage;
use crate::catalog::reviews::{NewReview, Review, ReviewList};
use crate::common::{ChatHistory, OutgoingMessage};
use crate::error::{ClientError, Result};

pub const CSRF_HEADER: &str = "x-csrf-token";
const ADMIN_COOKIE: &str = "adminToken";

/// Which token a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    User,
    Admin,
}

/// REST operations the chat session needs from the backing store.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// `None` when no chat session exists yet.
    async fn chat_history(&self) -> Result<Option<ChatHistory>>;

    async fn send_message(&self, message: &OutgoingMessage) -> Result<ChatHistory>;

    async fn mark_read(&self, chat_id: &str) -> Result<()>;
}

/// Typed client for the storefront REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    user_token: Option<String>,
    admin_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_token: None,
            admin_token: None,
        })
    }

    pub fn with_user_token(mut self, token: impl Into<String>) -> Self {
        self.user_token = Some(token.into());
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========== Catalog ==========

    pub async fn products(&self, page: u32, limit: u32) -> Result<ProductPage> {
        let request = self
            .request(Method::GET, "/products/get", Auth::Anonymous)?
            .query(&[("page", page), ("limit", limit)]);
        decode(request.send().await?).await
    }

    pub async fn reviews(&self, product_id: &str) -> Result<Vec<Review>> {
        let path = format!("/user/review/get/{product_id}");
        let request = self.request(Method::GET, &path, Auth::Anonymous)?;
        let list: ReviewList = decode(request.send().await?).await?;
        Ok(list.reviews)
    }

    /// Validates locally first; nothing is sent for an incomplete review.
    pub async fn add_review(&self, review: &NewReview) -> Result<()> {
        review.validate()?;
        self.send_mutating(Method::POST, "/user/review/add", Auth::User, Some(review))
            .await?;
        log::info!("Review submitted for product {}", review.product_id);
        Ok(())
    }

    // ========== Auth ==========

    pub async fn login(&self, request: &LoginRequest) -> Result<Credentials> {
        request.validate()?;
        let response = self
            .send_mutating(Method::POST, "/user/login", Auth::Anonymous, Some(request))
            .await?;
        let body: LoginResponse = decode(response).await?;
        Ok(body.into_credentials())
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<()> {
        request.validate()?;
        self.send_mutating(Method::POST, "/user/register", Auth::Anonymous, Some(request))
            .await?;
        Ok(())
    }

    pub async fn admin_login(&self, request: &LoginRequest) -> Result<Credentials> {
        request.validate()?;
        let response = self
            .send_mutating(Method::POST, "/admin/login", Auth::Anonymous, Some(request))
            .await?;
        let body: AdminLoginResponse = decode(response).await?;
        Ok(body.into_credentials())
    }

    /// Confirms the admin cookie token is still accepted.
    pub async fn verify_admin_session(&self) -> Result<()> {
        let request = self.request(Method::GET, "/admin/check-auth", Auth::Admin)?;
        check_status(request.send().await?).await?;
        Ok(())
    }

    // ========== CSRF ==========

    pub async fn fetch_csrf_token(&self) -> Result<String> {
        let request = self.request(Method::GET, "/csrf-token", Auth::Anonymous)?;
        let body: Value = decode(request.send().await?).await?;
        body.get("csrfToken")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Status {
                status: 200,
                message: "CSRF token missing from response".to_string(),
            })
    }

    /// Sends a non-GET request with a fresh CSRF token.
    ///
    /// A 403 mentioning CSRF is retried once with a refetched token; a second rejection
    /// is returned as [`ClientError::CsrfRejected`].
    pub async fn send_mutating<B>(
        &self,
        method: Method,
        path: &str,
        auth: Auth,
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let mut token = self.fetch_csrf_token().await?;
        let mut retried = false;

        loop {
            let mut request = self
                .request(method.clone(), path, auth)?
                .header(CSRF_HEADER, token.as_str());
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            if response.status() != StatusCode::FORBIDDEN {
                return check_status(response).await;
            }

            let message = error_message(response).await;
            if !is_csrf_rejection(&message) {
                return Err(ClientError::Status {
                    status: StatusCode::FORBIDDEN.as_u16(),
                    message,
                });
            }
            if retried {
                log::error!("{method} {path} rejected by CSRF protection after token refresh");
                return Err(ClientError::CsrfRejected(message));
            }

            log::warn!("{method} {path} rejected by CSRF protection; refreshing token");
            token = self.fetch_csrf_token().await?;
            retried = true;
        }
    }

    fn request(&self, method: Method, path: &str, auth: Auth) -> Result<RequestBuilder> {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        match auth {
            Auth::Anonymous => Ok(request),
            Auth::User => {
                let token = self
                    .user_token
                    .as_deref()
                    .ok_or(ClientError::MissingCredentials)?;
                Ok(request.header(AUTHORIZATION, format!("Bearer {token}")))
            }
            Auth::Admin => {
                let token = self
                    .admin_token
                    .as_deref()
                    .ok_or(ClientError::MissingCredentials)?;
                Ok(request.header(COOKIE, format!("{ADMIN_COOKIE}={token}")))
            }
        }
    }
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn chat_history(&self) -> Result<Option<ChatHistory>> {
        let request = self.request(Method::GET, "/chat/user-chats", Auth::User)?;
        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: Option<ChatHistory> = decode(response).await?;
        Ok(body.filter(|history| !history.chat_id.is_empty()))
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<ChatHistory> {
        let response = self
            .send_mutating(Method::POST, "/chat/send-message", Auth::User, Some(message))
            .await?;
        decode(response).await
    }

    async fn mark_read(&self, chat_id: &str) -> Result<()> {
        let path = format!("/chat/mark-read/{chat_id}");
        self.send_mutating::<()>(Method::PUT, &path, Auth::User, None)
            .await?;
        Ok(())
    }
}

pub fn is_csrf_rejection(message: &str) -> bool {
    message.to_ascii_lowercase().contains("csrf")
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(response).await;
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized(message));
    }
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `message` field of an error body, or the raw body when it is not JSON.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if text.is_empty() {
                status.to_string()
            } else {
                text
            }
        })
}
