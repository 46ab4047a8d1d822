pub(crate) mod pending;
pub mod process_table;
pub(crate) mod sender_queue;
pub(crate) mod state;

use std::{
    future::Future,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use rendezvous_model::Endpoint;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    error::Error,
    protocol::{
        endpoint::{LocalEndpoint, LocalEndpointInner},
        process::{ExitRecord, ExitStatus, ProcessHandle},
    },
};

use process_table::EndpointState;
use state::IpcState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Endpoints are registered in `0..max_processes`.
    pub max_processes: usize,
    /// Reject calls that would close a cycle of blocked endpoints.
    pub deadlock_detection: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: 256,
            deadlock_detection: true,
        }
    }
}

#[derive(Debug)]
pub struct KernelInner {
    config: KernelConfig,
    state: Mutex<IpcState>,
    ct: CancellationToken,
}

impl KernelInner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, IpcState> {
        // the state is consistent after every step, a panic elsewhere can't tear it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.ct
    }
    pub fn is_alive(&self, endpoint: Endpoint) -> bool {
        self.lock().table.contains(endpoint)
    }
    /// Whether `endpoint` is idle or blocked, and on whom.
    pub fn endpoint_state(&self, endpoint: Endpoint) -> Option<EndpointState> {
        self.lock().table.get(endpoint).map(|slot| slot.state())
    }
    /// How many senders are blocked waiting for `endpoint` to receive.
    pub fn queued_senders(&self, endpoint: Endpoint) -> Option<usize> {
        self.lock().table.get(endpoint).map(|slot| slot.senders.len())
    }
    pub fn exit_record(&self, endpoint: Endpoint) -> Option<ExitRecord> {
        self.lock().table.exit_record(endpoint).cloned()
    }
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.lock().table.endpoints().collect()
    }
    /// Terminates `endpoint` from the outside. Returns `false` if it was not
    /// alive.
    pub fn kill(&self, endpoint: Endpoint) -> bool {
        self.terminate(endpoint, None, ExitStatus::Killed).is_some()
    }
    /// Kills every endpoint and cancels the kernel token.
    pub fn shutdown(&self) {
        let endpoints = self.endpoints();
        tracing::info!(count = endpoints.len(), "kernel shutting down");
        for endpoint in endpoints {
            self.kill(endpoint);
        }
        self.ct.cancel();
    }
    pub(crate) fn terminate(
        &self,
        endpoint: Endpoint,
        incarnation: Option<u64>,
        status: ExitStatus,
    ) -> Option<ExitRecord> {
        self.lock().terminate(endpoint, incarnation, status)
    }
    pub(crate) fn cancel_pending(&self, endpoint: Endpoint, ticket: u64) {
        self.lock().cancel(endpoint, ticket);
    }
}

#[derive(Debug, Clone, Default)]
pub struct KernelRef {
    inner: Weak<KernelInner>,
}

impl KernelRef {
    pub fn upgrade(&self) -> Option<Kernel> {
        self.inner.upgrade().map(|inner| Kernel { inner })
    }
}

/// The rendezvous channel shared by a set of endpoints.
#[derive(Clone)]
pub struct Kernel {
    pub(crate) inner: Arc<KernelInner>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("config", self.config())
            .field("endpoints", &self.endpoints())
            .finish()
    }
}

impl Deref for Kernel {
    type Target = KernelInner;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Kernel {
    pub fn new(config: KernelConfig) -> Self {
        let state = IpcState::new(&config);
        Self {
            inner: Arc::new(KernelInner {
                config,
                state: Mutex::new(state),
                ct: CancellationToken::new(),
            }),
        }
    }
    pub fn reference(&self) -> KernelRef {
        KernelRef {
            inner: Arc::downgrade(&self.inner),
        }
    }
    /// Makes `endpoint` a live party of this channel.
    ///
    /// The returned handle is the only way to act as `endpoint`; when every
    /// clone of it is dropped the endpoint terminates with
    /// [`ExitStatus::Dropped`].
    pub fn register(
        &self,
        endpoint: Endpoint,
        name: impl Into<String>,
    ) -> crate::Result<(LocalEndpoint, ProcessHandle)> {
        let name = name.into();
        let (incarnation, handle) = self
            .lock()
            .table
            .register(endpoint, name.clone())
            .map_err(Error::contextual(format!("register {name}")))?;
        tracing::debug!(%endpoint, %name, incarnation, "endpoint registered");
        let local = LocalEndpoint {
            inner: Arc::new(LocalEndpointInner {
                kernel: self.reference(),
                address: endpoint,
                incarnation,
                name,
            }),
        };
        Ok((local, handle))
    }
    /// Registers `endpoint` and runs `body` for it on the tokio runtime.
    ///
    /// The endpoint terminates when `body` finishes, or when it is killed,
    /// which also aborts the task.
    pub fn spawn<F, Fut>(
        &self,
        endpoint: Endpoint,
        name: impl Into<String>,
        body: F,
    ) -> crate::Result<ProcessHandle>
    where
        F: FnOnce(LocalEndpoint) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (local, handle) = self.register(endpoint, name)?;
        let incarnation = local.incarnation;
        let span = tracing::info_span!("endpoint", %endpoint, name = %local.name());
        let task = tokio::spawn(body(local).instrument(span));
        let mut state = self.lock();
        match state.table.get_mut(endpoint) {
            Some(slot) if slot.incarnation == incarnation => {
                slot.task = Some(task.abort_handle());
            }
            // already gone, killed before the task handle arrived
            _ => task.abort(),
        }
        Ok(handle)
    }
}
