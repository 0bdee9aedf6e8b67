//! Process-scoped identity client bridge.
//!
//! One `IdentityBridge` is shared (via `Arc`) by every controller in a
//! process. It owns the script load, the FIFO queue of pending `initialize`
//! configs and the "last config" slot, so that several controllers never load
//! the identity script twice.
//!
//! ```text
//!  enqueue_initialize ──► queue ──┐
//!                                 ▼
//!  ensure_client_ready ──► load (shared) ──► client ──► drain queue in order
//! ```

use crate::client::{IdentityClient, IdentityScriptLoader, InitConfig, LastInitConfig};
use crate::{BridgeError, BridgeResult};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type ClientFuture = Shared<BoxFuture<'static, BridgeResult<Arc<dyn IdentityClient>>>>;

struct PendingLoad {
    id: u64,
    generation: u64,
    future: ClientFuture,
}

/// Lazily loads the identity client once and replays queued initializations.
pub struct IdentityBridge {
    loader: Arc<dyn IdentityScriptLoader>,
    client: Mutex<Option<Arc<dyn IdentityClient>>>,
    loading: Mutex<Option<PendingLoad>>,
    queue: Mutex<VecDeque<InitConfig>>,
    last_config: Mutex<Option<LastInitConfig>>,
    loads_started: AtomicU64,
    /// Load ids, never reset.
    next_load_id: AtomicU64,
    /// Bumped by every `reset`; loads from an older generation are discarded.
    generation: AtomicU64,
}

impl IdentityBridge {
    pub fn new(loader: Arc<dyn IdentityScriptLoader>) -> Self {
        Self {
            loader,
            client: Mutex::new(None),
            loading: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            last_config: Mutex::new(None),
            loads_started: AtomicU64::new(0),
            next_load_id: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of script loads started since construction or the last reset.
    pub fn loads_started(&self) -> u64 {
        self.loads_started.load(Ordering::SeqCst)
    }

    /// Configs still waiting for the client.
    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Most recent `{client_id, nonce}` passed to [`enqueue_initialize`](Self::enqueue_initialize).
    pub fn last_config(&self) -> Option<LastInitConfig> {
        self.last_config.lock().clone()
    }

    /// The loaded client, if the script has finished loading.
    pub fn client(&self) -> Option<Arc<dyn IdentityClient>> {
        self.ready_client()
    }

    fn ready_client(&self) -> Option<Arc<dyn IdentityClient>> {
        let mut slot = self.client.lock();
        if slot.is_none() {
            if let Some(present) = self.loader.present() {
                debug!("Identity client already present, skipping script load");
                *slot = Some(present);
            }
        }
        slot.clone()
    }

    /// Resolve the identity client, loading the script if needed, then drain
    /// every queued config in FIFO order.
    ///
    /// Concurrent callers share one load. A failed load rejects all of them,
    /// drops the queued configs and lets the next call start over. A load that
    /// outlives a [`reset`](Self::reset) is discarded and reported as
    /// [`BridgeError::Unavailable`].
    pub async fn ensure_client_ready(&self) -> BridgeResult<Arc<dyn IdentityClient>> {
        if let Some(client) = self.ready_client() {
            self.drain(&client)?;
            return Ok(client);
        }

        let (load_id, generation, future) = {
            let mut loading = self.loading.lock();
            match loading.as_ref() {
                Some(pending) => (pending.id, pending.generation, pending.future.clone()),
                None => {
                    let id = self.next_load_id.fetch_add(1, Ordering::SeqCst) + 1;
                    let generation = self.generation.load(Ordering::SeqCst);
                    self.loads_started.fetch_add(1, Ordering::SeqCst);
                    info!(load_id = id, "Loading identity client script");
                    let loader = self.loader.clone();
                    let future = async move { loader.load().await }.boxed().shared();
                    *loading = Some(PendingLoad {
                        id,
                        generation,
                        future: future.clone(),
                    });
                    (id, generation, future)
                }
            }
        };

        let result = future.await;
        self.finish_load(load_id);

        if self.generation.load(Ordering::SeqCst) != generation {
            warn!(load_id, "Identity bridge was reset during script load, discarding client");
            return Err(BridgeError::Unavailable(
                "identity bridge was reset while the script was loading".to_string(),
            ));
        }

        match result {
            Ok(client) => {
                {
                    let mut slot = self.client.lock();
                    if slot.is_none() {
                        *slot = Some(client.clone());
                    }
                }
                self.drain(&client)?;
                Ok(client)
            }
            Err(err) => {
                let dropped = {
                    let mut queue = self.queue.lock();
                    let dropped = queue.len();
                    queue.clear();
                    dropped
                };
                warn!(load_id, dropped, error = %err, "Identity script load failed");
                Err(err)
            }
        }
    }

    fn finish_load(&self, load_id: u64) {
        let mut loading = self.loading.lock();
        if loading.as_ref().is_some_and(|pending| pending.id == load_id) {
            *loading = None;
        }
    }

    /// Queue an `initialize` call. Applied immediately when the client is ready.
    pub fn enqueue_initialize(&self, config: InitConfig) -> BridgeResult<()> {
        *self.last_config.lock() = Some(LastInitConfig::from(&config));
        self.queue.lock().push_back(config);

        match self.ready_client() {
            Some(client) => self.drain(&client),
            None => {
                debug!(pending = self.pending_len(), "Identity client not ready, config queued");
                Ok(())
            }
        }
    }

    fn drain(&self, client: &Arc<dyn IdentityClient>) -> BridgeResult<()> {
        loop {
            let next = self.queue.lock().pop_front();
            let Some(config) = next else {
                return Ok(());
            };
            debug!(client_id = %config.client_id, "Initializing identity client");
            client.initialize(&config).map_err(|e| match e {
                BridgeError::InitializeFailed(_) => e,
                other => BridgeError::InitializeFailed(other.to_string()),
            })?;
        }
    }

    /// Teardown: forget the client, any in-flight load, queued configs and the last config.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.client.lock() = None;
        *self.loading.lock() = None;
        self.queue.lock().clear();
        *self.last_config.lock() = None;
        self.loads_started.store(0, Ordering::SeqCst);
        debug!("Identity bridge reset");
    }
}
