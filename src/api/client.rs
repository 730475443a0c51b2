//! HTTP client with bearer credential injection and transparent token refresh.
//!
//! Requests pass through a fixed middleware chain:
//!
//! ```text
//! ApiClient -> RefreshLayer -> BearerLayer -> HttpTransport
//! ```
//!
//! `BearerLayer` attaches the session's access token before every send.
//! `RefreshLayer` watches for 401 responses, refreshes the access token once
//! and replays the request through the bearer layer with the new token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;

use super::error::ApiError;
use super::session::Session;
use super::types::{RefreshRequest, RefreshResponse};

/// Endpoint that trades a refresh token for a new access token.
pub const REFRESH_PATH: &str = "/token/refresh/";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of an outgoing request. Owned so a request can be sent a second time unchanged.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart {
        field: String,
        file_name: String,
        data: Vec<u8>,
    },
}

/// A pending call: what to send, the credential it was last sent with, and
/// whether it has already been replayed after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/files/`.
    pub path: String,
    pub body: RequestBody,
    pub credential: Option<String>,
    pub retried: bool,
}

impl ApiRequest {
    /// Request with no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            credential: None,
            retried: false,
        }
    }

    /// Request with a JSON body, serialized once up front.
    pub fn json<T: Serialize + ?Sized>(
        method: Method,
        path: impl Into<String>,
        body: &T,
    ) -> Result<Self, ApiError> {
        let mut request = Self::new(method, path);
        request.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(request)
    }

    /// POST with a single file part.
    pub fn multipart(
        path: impl Into<String>,
        field: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        let mut request = Self::new(Method::POST, path);
        request.body = RequestBody::Multipart {
            field: field.into(),
            file_name: file_name.into(),
            data,
        };
        request
    }
}

/// One link of the request pipeline.
///
/// Layers take the request mutably so outer layers can see what inner layers
/// did to it (notably which credential was attached).
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn execute(&self, request: &mut ApiRequest) -> Result<Response, ApiError>;
}

/// Innermost layer: turns an [`ApiRequest`] into a reqwest call.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Transport for HttpTransport {
    async fn execute(&self, request: &mut ApiRequest) -> Result<Response, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart {
                field,
                file_name,
                data,
            } => {
                let part = Part::bytes(data.clone())
                    .file_name(file_name.clone())
                    .mime_str("application/octet-stream")?;
                builder.multipart(Form::new().part(field.clone(), part))
            }
        };

        if let Some(ref token) = request.credential {
            builder = builder.bearer_auth(token);
        }

        log::debug!("{} {}", request.method, request.path);
        let resp = builder.send().await?;
        log::debug!("{} {} -> {}", request.method, request.path, resp.status());
        Ok(resp)
    }
}

/// Attaches the session's current access token, or nothing when there is none.
pub struct BearerLayer<T> {
    inner: T,
    session: Arc<Session>,
}

impl<T> BearerLayer<T> {
    pub fn new(inner: T, session: Arc<Session>) -> Self {
        Self { inner, session }
    }
}

impl<T: Transport> Transport for BearerLayer<T> {
    async fn execute(&self, request: &mut ApiRequest) -> Result<Response, ApiError> {
        request.credential = self.session.access_token().await;
        self.inner.execute(request).await
    }
}

/// Recovers from a single access-token expiry per request.
///
/// The refresh call goes through `refresher`, a bare transport, so it never
/// re-enters this layer. Refreshes are single-flight: the session's refresh
/// gate is held for the whole exchange, and a caller that finds the token
/// already changed since its request was sent reuses it instead of refreshing again.
pub struct RefreshLayer<T> {
    inner: T,
    refresher: HttpTransport,
    session: Arc<Session>,
}

impl<T> RefreshLayer<T> {
    pub fn new(inner: T, refresher: HttpTransport, session: Arc<Session>) -> Self {
        Self {
            inner,
            refresher,
            session,
        }
    }
}

impl<T: Transport> Transport for RefreshLayer<T> {
    async fn execute(&self, request: &mut ApiRequest) -> Result<Response, ApiError> {
        loop {
            let resp = self.inner.execute(request).await?;
            if resp.status() != StatusCode::UNAUTHORIZED {
                return Ok(resp);
            }

            if request.retried {
                log::warn!(
                    "{} {} rejected again after token refresh",
                    request.method,
                    request.path
                );
                let body = resp.text().await.unwrap_or_default();
                return Err(ApiError::from_status(StatusCode::UNAUTHORIZED, body));
            }
            drop(resp);

            request.retried = true;
            let stale = request.credential.take();
            self.refresh(stale.as_deref()).await?;
            log::debug!(
                "Replaying {} {} with refreshed token",
                request.method,
                request.path
            );
        }
    }
}

impl<T> RefreshLayer<T> {
    async fn refresh(&self, stale: Option<&str>) -> Result<(), ApiError> {
        let _gate = self.session.lock_refresh().await;

        match self.session.access_token().await {
            Some(current) if stale != Some(current.as_str()) => {
                log::debug!("Access token already refreshed by a concurrent request");
                return Ok(());
            }
            None if stale.is_some() => {
                return Err(ApiError::RefreshFailed(Box::new(ApiError::Unauthenticated(
                    "Session ended while waiting for token refresh".to_string(),
                ))));
            }
            _ => {}
        }

        // Store read errors propagate without expiring the session.
        let refresh = self.session.refresh_token()?;

        match self.request_new_token(refresh).await {
            Ok(refreshed) => {
                self.session.replace_access_token(&refreshed.access).await?;
                if let Some(ref rotated) = refreshed.refresh {
                    self.session.replace_refresh_token(rotated)?;
                }
                log::info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                log::warn!("Token refresh failed: {}", e);
                self.session.expire().await;
                Err(ApiError::RefreshFailed(Box::new(e)))
            }
        }
    }

    async fn request_new_token(&self, refresh: Option<String>) -> Result<RefreshResponse, ApiError> {
        let refresh =
            refresh.ok_or_else(|| ApiError::Unauthenticated("No refresh token stored".to_string()))?;

        let mut request = ApiRequest::json(Method::POST, REFRESH_PATH, &RefreshRequest { refresh })?;
        let resp = ApiError::check(self.refresher.execute(&mut request).await?).await?;

        resp.json()
            .await
            .map_err(|e| ApiError::Decode(format!("refresh response: {}", e)))
    }
}

/// HTTP client wrapper for the file-management API.
///
/// `authenticated_*` methods go through the full middleware chain; `post`
/// goes straight to the transport and is used for login and registration.
pub struct ApiClient {
    session: Arc<Session>,
    plain: HttpTransport,
    chain: RefreshLayer<BearerLayer<HttpTransport>>,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeouts.
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self, ApiError> {
        Self::with_timeouts(base_url, session, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a client with explicit request and connect timeouts.
    pub fn with_timeouts(
        base_url: &str,
        session: Arc<Session>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let plain = HttpTransport::new(base_url, timeout, connect_timeout)?;
        let chain = RefreshLayer::new(
            BearerLayer::new(plain.clone(), session.clone()),
            plain.clone(),
            session.clone(),
        );
        Ok(Self {
            session,
            plain,
            chain,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Send a request through the authenticated chain.
    ///
    /// Any status other than 401 comes back untouched; callers decide what
    /// counts as success.
    pub async fn send(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        self.chain.execute(&mut request).await
    }

    /// Send a request with no credential and no refresh handling.
    pub async fn send_unauthenticated(&self, mut request: ApiRequest) -> Result<Response, ApiError> {
        self.plain.execute(&mut request).await
    }

    pub async fn authenticated_get(&self, path: &str) -> Result<Response, ApiError> {
        self.send(ApiRequest::new(Method::GET, path)).await
    }

    pub async fn authenticated_post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        self.send(ApiRequest::json(Method::POST, path, body)?).await
    }

    pub async fn authenticated_put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        self.send(ApiRequest::json(Method::PUT, path, body)?).await
    }

    pub async fn authenticated_delete(&self, path: &str) -> Result<Response, ApiError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await
    }

    /// Authenticated multipart POST with a single file part.
    pub async fn authenticated_multipart_post(
        &self,
        path: &str,
        field: &str,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<Response, ApiError> {
        self.send(ApiRequest::multipart(path, field, file_name, data))
            .await
    }

    /// Unauthenticated JSON POST (login, registration).
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        self.send_unauthenticated(ApiRequest::json(Method::POST, path, body)?)
            .await
    }
}
