//! Session transports.
//!
//! Each operation first goes to the optional host-supplied
//! [`SessionTransportHelper`]. When the helper is absent, does not implement
//! the operation, or reports a missing base configuration, the resolver falls
//! back to a direct HTTP call against the configured session service.

use crate::nonce::NonceToken;
use crate::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tauth_config::ControllerConfig;
use tracing::{debug, warn};

/// Header carrying the tenant on every fallback request.
pub const TENANT_HEADER: &str = "X-TAuth-Tenant";

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Body of the credential exchange request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeRequest {
    pub google_id_token: String,
    pub nonce_token: String,
}

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: Option<String>,
}

/// What a helper is told about the controller it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportContext {
    pub base_url: String,
    pub tenant_id: String,
}

/// Session operations a host may implement itself.
///
/// Every method defaults to [`TransportError::Unsupported`], which sends the
/// operation to the HTTP fallback.
#[async_trait]
pub trait SessionTransportHelper: Send + Sync {
    async fn request_nonce(&self, _ctx: &TransportContext) -> Result<NonceToken, TransportError> {
        Err(TransportError::Unsupported("request_nonce"))
    }

    async fn exchange_credential(
        &self,
        _ctx: &TransportContext,
        _request: &ExchangeRequest,
    ) -> Result<Value, TransportError> {
        Err(TransportError::Unsupported("exchange_credential"))
    }

    async fn logout(&self, _ctx: &TransportContext) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("logout"))
    }
}

/// Direct HTTP transport against the session service.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: Client,
    nonce_url: String,
    login_url: String,
    logout_url: String,
    tenant_id: String,
}

impl HttpTransport {
    pub fn new(config: &ControllerConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder().timeout(config.request_timeout);
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        Ok(Self {
            http_client: builder.build()?,
            nonce_url: config.nonce_url(),
            login_url: config.login_url(),
            logout_url: config.logout_url(),
            tenant_id: config.tenant_id.clone(),
        })
    }

    /// Send `request` and turn a non-success status into [`TransportError::Status`].
    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response, TransportError> {
        let response = request.header(TENANT_HEADER, &self.tenant_id).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, operation, "Session service request failed");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body_summary,
            });
        }

        Ok(response)
    }

    pub async fn request_nonce(&self) -> Result<NonceToken, TransportError> {
        debug!(url = %self.nonce_url, "Requesting nonce");
        let request = self
            .http_client
            .post(&self.nonce_url)
            .header(CONTENT_TYPE, "application/json");
        let response = self.send(request, "request_nonce").await?;

        let data: NonceResponse = response.json().await?;
        match data.nonce.filter(|nonce| !nonce.is_empty()) {
            Some(nonce) => Ok(NonceToken::new(nonce)),
            None => Err(TransportError::InvalidResponse(
                "nonce response carried no nonce".to_string(),
            )),
        }
    }

    pub async fn exchange_credential(&self, request: &ExchangeRequest) -> Result<Value, TransportError> {
        debug!(url = %self.login_url, "Exchanging credential");
        let builder = self.http_client.post(&self.login_url).json(request);
        let response = self.send(builder, "exchange_credential").await?;
        Ok(response.json().await?)
    }

    pub async fn logout(&self) -> Result<(), TransportError> {
        debug!(url = %self.logout_url, "Logging out");
        let request = self.http_client.post(&self.logout_url);
        self.send(request, "logout").await?;
        Ok(())
    }
}

fn is_loopback(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| host == "localhost" || host == "127.0.0.1" || host == "[::1]")
}

/// Which transport served an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportRoute {
    Helper,
    Fallback,
}

impl fmt::Display for TransportRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportRoute::Helper => write!(f, "helper"),
            TransportRoute::Fallback => write!(f, "fallback"),
        }
    }
}

/// Picks the helper or the HTTP fallback per operation.
pub struct TransportResolver {
    helper: Option<Arc<dyn SessionTransportHelper>>,
    fallback: HttpTransport,
    context: TransportContext,
}

impl TransportResolver {
    pub fn new(config: &ControllerConfig, helper: Option<Arc<dyn SessionTransportHelper>>) -> Result<Self, TransportError> {
        Ok(Self {
            helper,
            fallback: HttpTransport::new(config)?,
            context: TransportContext {
                base_url: config.base_url.clone(),
                tenant_id: config.tenant_id.clone(),
            },
        })
    }

    pub fn has_helper(&self) -> bool {
        self.helper.is_some()
    }

    pub fn context(&self) -> &TransportContext {
        &self.context
    }

    fn helper_declined(operation: &str, err: &TransportError) {
        debug!(
            operation,
            route = %TransportRoute::Fallback,
            reason = %err,
            "Session helper unavailable, using HTTP fallback"
        );
    }

    pub async fn request_nonce(&self) -> Result<NonceToken, TransportError> {
        if let Some(helper) = &self.helper {
            match helper.request_nonce(&self.context).await {
                Ok(token) => {
                    debug!(route = %TransportRoute::Helper, "Nonce issued");
                    return Ok(token);
                }
                Err(err) if err.allows_fallback() => Self::helper_declined("request_nonce", &err),
                Err(err) => return Err(err),
            }
        }
        self.fallback.request_nonce().await
    }

    pub async fn exchange_credential(&self, request: &ExchangeRequest) -> Result<Value, TransportError> {
        if let Some(helper) = &self.helper {
            match helper.exchange_credential(&self.context, request).await {
                Ok(profile) => {
                    debug!(route = %TransportRoute::Helper, "Credential exchanged");
                    return Ok(profile);
                }
                Err(err) if err.allows_fallback() => {
                    Self::helper_declined("exchange_credential", &err)
                }
                Err(err) => return Err(err),
            }
        }
        self.fallback.exchange_credential(request).await
    }

    pub async fn logout(&self) -> Result<(), TransportError> {
        if let Some(helper) = &self.helper {
            match helper.logout(&self.context).await {
                Ok(()) => {
                    debug!(route = %TransportRoute::Helper, "Logged out");
                    return Ok(());
                }
                Err(err) if err.allows_fallback() => Self::helper_declined("logout", &err),
                Err(err) => return Err(err),
            }
        }
        self.fallback.logout().await
    }
}
