//! Single-use nonce issuance.
//!
//! Concurrent `request_nonce` calls share one in-flight request. A token
//! handed to the identity client is held as *pending* until exactly one
//! credential exchange takes it, or sign-out discards it.

use crate::transport::TransportResolver;
use crate::{AuthError, AuthResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Anti-replay token issued by the session service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NonceToken(String);

impl NonceToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NonceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NonceToken({})", self.0)
    }
}

type SharedNonce = Shared<BoxFuture<'static, AuthResult<NonceToken>>>;

struct InFlight {
    id: u64,
    future: SharedNonce,
}

pub struct NonceBroker {
    transport: Arc<TransportResolver>,
    in_flight: Mutex<Option<InFlight>>,
    pending: Mutex<Option<NonceToken>>,
    requests_started: AtomicU64,
}

impl NonceBroker {
    pub fn new(transport: Arc<TransportResolver>) -> Self {
        Self {
            transport,
            in_flight: Mutex::new(None),
            pending: Mutex::new(None),
            requests_started: AtomicU64::new(0),
        }
    }

    /// Transport requests issued so far.
    pub fn requests_started(&self) -> u64 {
        self.requests_started.load(Ordering::SeqCst)
    }

    /// Issue a fresh nonce, joining any request already in flight.
    ///
    /// Failures surface as `nonce_failed` and are not retried; the in-flight
    /// slot is cleared either way so the next call starts over.
    pub async fn request_nonce(&self) -> AuthResult<NonceToken> {
        let (id, future) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.as_ref() {
                Some(current) => {
                    debug!(request_id = current.id, "Joining in-flight nonce request");
                    (current.id, current.future.clone())
                }
                None => {
                    let id = self.requests_started.fetch_add(1, Ordering::SeqCst) + 1;
                    let transport = self.transport.clone();
                    let future = async move {
                        transport
                            .request_nonce()
                            .await
                            .map_err(AuthError::nonce_failed)
                    }
                    .boxed()
                    .shared();
                    *in_flight = Some(InFlight {
                        id,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let result = future.await;

        let mut in_flight = self.in_flight.lock();
        if in_flight.as_ref().is_some_and(|current| current.id == id) {
            *in_flight = None;
        }
        result
    }

    /// Reuse the pending token if one exists, otherwise request one and mark it pending.
    pub async fn prepare_nonce(&self) -> AuthResult<NonceToken> {
        if let Some(token) = self.pending.lock().clone() {
            debug!("Reusing pending nonce");
            return Ok(token);
        }

        let token = self.request_nonce().await?;

        let mut pending = self.pending.lock();
        if let Some(existing) = pending.as_ref() {
            // Another preparation finished first; keep a single pending token.
            return Ok(existing.clone());
        }
        *pending = Some(token.clone());
        info!("Nonce prepared for sign-in");
        Ok(token)
    }

    /// Consume the pending token. Returns `None` once it has been taken.
    pub fn take_pending(&self) -> Option<NonceToken> {
        self.pending.lock().take()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn discard_pending(&self) {
        if self.pending.lock().take().is_some() {
            debug!("Discarded pending nonce");
        }
    }
}
