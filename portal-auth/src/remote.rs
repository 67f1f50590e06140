//! HTTP account service client
//!
//! Implements [`AccountStore`] and [`SessionStore`] against a remote account
//! service. Every request failure, including unexpected status codes, maps to
//! [`AuthError::Transport`].

use crate::account::{AccountStore, UserAccount};
use crate::session::{SessionRecord, SessionStore};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Configuration for the remote account service
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080/api`
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
    /// Additional headers
    pub headers: HashMap<String, String>,
}

impl RemoteConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: 30,
            user_agent: "portal/0.1".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Set additional header
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.insert(key, value);
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set user agent
    pub fn with_user_agent<S: Into<String>>(mut self, user_agent: S) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewUserBody<'a> {
    email: &'a str,
    password: &'a str,
    approved: bool,
}

/// Account and session store backed by the remote account service
pub struct RemoteStore {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteStore {
    pub fn new(config: RemoteConfig) -> AuthResult<Self> {
        let client = create_http_client(&config)?;

        info!("Created account service client for {}", config.base_url);

        Ok(Self { client, config })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        debug!("Account service request: {} {}", method, url);
        self.client.request(method, url)
    }

    fn user_endpoint(email: &str, action: Option<&str>) -> String {
        let email = urlencoding::encode(email);
        match action {
            Some(action) => format!("users/{}/{}", email, action),
            None => format!("users/{}", email),
        }
    }

    /// Send and accept any success status; `404` counts as "nothing to do"
    async fn send_tolerating_missing(&self, builder: RequestBuilder) -> AuthResult<()> {
        let response = builder.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Account service reported missing resource, ignoring");
            return Ok(());
        }
        ensure_success(response).await.map(|_| ())
    }
}

#[async_trait]
impl AccountStore for RemoteStore {
    async fn find_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<UserAccount>> {
        let response = self
            .request(Method::POST, "auth/login")
            .json(&CredentialsBody { email, password })
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            _ => Ok(Some(ensure_success(response).await?.json().await?)),
        }
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<UserAccount>> {
        let accounts = self.list_all().await?;
        Ok(accounts.into_iter().find(|account| account.email == email))
    }

    async fn add(
        &self,
        email: &str,
        password: &str,
        auto_approve: bool,
    ) -> AuthResult<UserAccount> {
        let response = self
            .request(Method::POST, "users")
            .json(&NewUserBody {
                email,
                password,
                approved: auto_approve,
            })
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            return Err(AuthError::DuplicateEmail {
                email: email.to_string(),
            });
        }

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn remove(&self, email: &str) -> AuthResult<()> {
        let builder = self.request(Method::DELETE, &Self::user_endpoint(email, None));
        self.send_tolerating_missing(builder).await
    }

    async fn approve(&self, email: &str) -> AuthResult<()> {
        let builder = self.request(Method::POST, &Self::user_endpoint(email, Some("approve")));
        self.send_tolerating_missing(builder).await
    }

    async fn reject(&self, email: &str) -> AuthResult<()> {
        let builder = self.request(Method::POST, &Self::user_endpoint(email, Some("reject")));
        self.send_tolerating_missing(builder).await
    }

    async fn list_all(&self) -> AuthResult<Vec<UserAccount>> {
        let response = self.request(Method::GET, "users").send().await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

#[async_trait]
impl SessionStore for RemoteStore {
    async fn activate(&self, user_id: u64) -> AuthResult<()> {
        let response = self
            .request(Method::PUT, &format!("sessions/{}", user_id))
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn deactivate(&self, user_id: u64) -> AuthResult<()> {
        let builder = self.request(Method::DELETE, &format!("sessions/{}", user_id));
        self.send_tolerating_missing(builder).await
    }

    async fn get(&self, user_id: u64) -> AuthResult<Option<SessionRecord>> {
        let response = self
            .request(Method::GET, &format!("sessions/{}", user_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response).await?.json().await?))
    }
}

/// Helper function to create HTTP client with common configuration
fn create_http_client(config: &RemoteConfig) -> AuthResult<reqwest::Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&config.user_agent).map_err(|e| {
            AuthError::transport_with_source(format!("Invalid user agent: {}", e), Box::new(e))
        })?,
    );

    for (key, value) in &config.headers {
        let header_name =
            reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                AuthError::transport_with_source(
                    format!("Invalid header name '{}': {}", key, e),
                    Box::new(e),
                )
            })?;

        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
            AuthError::transport_with_source(
                format!("Invalid header value for '{}': {}", key, e),
                Box::new(e),
            )
        })?;

        headers.insert(header_name, header_value);
    }

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .default_headers(headers)
        .build()
        .map_err(|e| {
            AuthError::transport_with_source(
                format!("Failed to create HTTP client: {}", e),
                Box::new(e),
            )
        })
}

/// Turn a non-success response into a transport error carrying the body
async fn ensure_success(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    Err(AuthError::transport(format!(
        "account service returned {} for {}: {}",
        status, url, body
    )))
}
