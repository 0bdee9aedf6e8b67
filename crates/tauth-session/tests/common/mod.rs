//! Shared fixtures for tauth-session integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use httpmock::{Mock, MockServer};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tauth_identity_bridge::{
    BridgeError, BridgeResult, CredentialCallback, CredentialResponse, IdentityBridge,
    IdentityClient, IdentityScriptLoader, InitConfig, LastInitConfig,
};
use tauth_session::{
    AuthConfig, AuthController, AuthEvent, ButtonOptions, ExchangeRequest, MemoryHostElement,
    NonceToken, SessionTransportHelper, Subscription, TransportContext, TransportError,
};
use tokio::sync::Notify;

// =============================================================================
// Session service routes
// =============================================================================

pub const SESSION_PATHS: [&str; 3] = ["/auth/nonce", "/auth/google", "/auth/logout"];

/// Catch-all mocks for every session endpoint, used to assert that nothing
/// reached the network.
pub fn session_routes(server: &MockServer) -> Vec<Mock<'_>> {
    SESSION_PATHS
        .into_iter()
        .map(|path| {
            server.mock(move |when, then| {
                when.path(path);
                then.status(500);
            })
        })
        .collect()
}

pub fn untouched(routes: &[Mock<'_>]) -> bool {
    routes.iter().all(|route| route.hits() == 0)
}

// =============================================================================
// Identity client fakes
// =============================================================================

#[derive(Default)]
pub struct RecordingClient {
    inits: Mutex<Vec<LastInitConfig>>,
    callbacks: Mutex<Vec<CredentialCallback>>,
    renders: Mutex<Vec<String>>,
    pub fail_render: AtomicBool,
}

impl RecordingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inits(&self) -> Vec<LastInitConfig> {
        self.inits.lock().clone()
    }

    pub fn renders(&self) -> Vec<String> {
        self.renders.lock().clone()
    }

    /// Invoke the most recently registered credential callback.
    pub fn fire_credential(&self, credential: Option<&str>) {
        let callback = self.callbacks.lock().last().cloned();
        if let Some(callback) = callback {
            callback(CredentialResponse {
                credential: credential.map(str::to_string),
                select_by: Some("btn".to_string()),
            });
        }
    }
}

impl IdentityClient for RecordingClient {
    fn initialize(&self, config: &InitConfig) -> BridgeResult<()> {
        self.inits.lock().push(LastInitConfig::from(config));
        self.callbacks.lock().push(config.callback.clone());
        Ok(())
    }

    fn render_button(&self, target: &str, _options: &ButtonOptions) -> BridgeResult<()> {
        if self.fail_render.load(Ordering::SeqCst) {
            return Err(BridgeError::RenderFailed(format!("no element {target}")));
        }
        self.renders.lock().push(target.to_string());
        Ok(())
    }
}

/// Loader that counts loads and can be held open or made to fail.
pub struct CountingLoader {
    client: Arc<RecordingClient>,
    loads: AtomicUsize,
    gate: Option<Arc<Notify>>,
    pub fail: AtomicBool,
}

impl CountingLoader {
    pub fn new(client: Arc<RecordingClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            loads: AtomicUsize::new(0),
            gate: None,
            fail: AtomicBool::new(false),
        })
    }

    pub fn gated(client: Arc<RecordingClient>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            client,
            loads: AtomicUsize::new(0),
            gate: Some(gate),
            fail: AtomicBool::new(false),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityScriptLoader for CountingLoader {
    async fn load(&self) -> BridgeResult<Arc<dyn IdentityClient>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::ScriptFailed("script blocked".to_string()));
        }
        Ok(self.client.clone())
    }
}

// =============================================================================
// Transport helper fake
// =============================================================================

/// Helper whose answers are set per operation. `None` means "not implemented".
#[derive(Default)]
pub struct ScriptedHelper {
    pub nonce: Mutex<Option<Result<String, TransportError>>>,
    pub exchange: Mutex<Option<Result<Value, TransportError>>>,
    pub logout: Mutex<Option<Result<(), TransportError>>>,
    pub nonce_gate: Option<Arc<Notify>>,
    pub exchange_gate: Option<Arc<Notify>>,
    pub nonce_calls: AtomicUsize,
    pub exchange_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub exchanged: Mutex<Vec<ExchangeRequest>>,
}

impl ScriptedHelper {
    pub fn with_nonce(nonce: &str) -> Self {
        Self {
            nonce: Mutex::new(Some(Ok(nonce.to_string()))),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionTransportHelper for ScriptedHelper {
    async fn request_nonce(&self, _ctx: &TransportContext) -> Result<NonceToken, TransportError> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.nonce_gate {
            gate.notified().await;
        }
        let answer = self.nonce.lock().clone();
        match answer {
            Some(result) => result.map(NonceToken::new),
            None => Err(TransportError::Unsupported("request_nonce")),
        }
    }

    async fn exchange_credential(
        &self,
        _ctx: &TransportContext,
        request: &ExchangeRequest,
    ) -> Result<Value, TransportError> {
        self.exchange_calls.fetch_add(1, Ordering::SeqCst);
        self.exchanged.lock().push(request.clone());
        if let Some(gate) = &self.exchange_gate {
            gate.notified().await;
        }
        let answer = self.exchange.lock().clone();
        answer.unwrap_or(Err(TransportError::Unsupported("exchange_credential")))
    }

    async fn logout(&self, _ctx: &TransportContext) -> Result<(), TransportError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.logout.lock().clone();
        answer.unwrap_or(Err(TransportError::Unsupported("logout")))
    }
}

// =============================================================================
// Controller helpers
// =============================================================================

/// Yield until `done` holds, giving spawned tasks a chance to run.
pub async fn settle(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
}

pub fn config(base_url: &str) -> AuthConfig {
    AuthConfig::new("abc", "t1").with_base_url(base_url)
}

pub struct Harness {
    pub controller: Arc<AuthController>,
    pub host: Arc<MemoryHostElement>,
    pub client: Arc<RecordingClient>,
    pub loader: Arc<CountingLoader>,
    pub bridge: Arc<IdentityBridge>,
}

/// Controller against `base_url` with a recording identity client and no helper or hook.
pub fn harness(base_url: &str) -> Harness {
    let client = RecordingClient::new();
    let loader = CountingLoader::new(client.clone());
    let bridge = Arc::new(IdentityBridge::new(loader.clone()));
    let host = Arc::new(MemoryHostElement::new());
    let controller = AuthController::builder(config(base_url), bridge.clone())
        .host(host.clone())
        .build()
        .unwrap();
    Harness {
        controller: Arc::new(controller),
        host,
        client,
        loader,
        bridge,
    }
}

/// Record every event the controller broadcasts.
pub fn record(controller: &AuthController) -> (Arc<Mutex<Vec<AuthEvent>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let sub = controller.subscribe(move |event| sink.lock().push(event.clone()));
    (seen, sub)
}

pub fn error_codes(events: &[AuthEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            AuthEvent::Error(detail) => Some(detail.code.clone()),
            _ => None,
        })
        .collect()
}
