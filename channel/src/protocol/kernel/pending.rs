use std::{future::Future, task::Poll};

use rendezvous_model::{Endpoint, IpcError, Message};
use tokio::sync::oneshot;

use super::KernelRef;

/// How a completed call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Sent,
    Received(Message),
}

pub(crate) type DeliveryResult = Result<Delivery, IpcError>;

/// Wakes the blocked endpoint. Dropping it unresolved reports `Terminated`.
#[derive(Debug)]
pub(crate) struct Resolver {
    endpoint: Endpoint,
    channel: Option<oneshot::Sender<DeliveryResult>>,
}

impl Resolver {
    pub fn new(endpoint: Endpoint) -> (Self, oneshot::Receiver<DeliveryResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                endpoint,
                channel: Some(tx),
            },
            rx,
        )
    }
    pub fn resolve(mut self, result: DeliveryResult) {
        if let Some(channel) = self.channel.take() {
            if channel.send(result).is_err() {
                tracing::debug!(endpoint = %self.endpoint, "blocked call abandoned before completion");
            }
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.send(Err(IpcError::Terminated));
        }
    }
}

/// The suspended half of a blocked call.
///
/// Dropping it before completion withdraws the pending operation, so an
/// aborted task never leaves its endpoint blocked.
#[derive(Debug)]
pub(crate) struct PendingHandle {
    kernel: KernelRef,
    endpoint: Endpoint,
    ticket: u64,
    result: oneshot::Receiver<DeliveryResult>,
    settled: bool,
}

impl PendingHandle {
    pub fn new(
        kernel: KernelRef,
        endpoint: Endpoint,
        ticket: u64,
        result: oneshot::Receiver<DeliveryResult>,
    ) -> Self {
        Self {
            kernel,
            endpoint,
            ticket,
            result,
            settled: false,
        }
    }
}

impl Future for PendingHandle {
    type Output = DeliveryResult;

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Self::Output> {
        let result = futures_util::ready!(std::pin::Pin::new(&mut self.result).poll(cx));
        self.settled = true;
        Poll::Ready(result.unwrap_or(Err(IpcError::Terminated)))
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(kernel) = self.kernel.upgrade() {
            kernel.cancel_pending(self.endpoint, self.ticket);
        }
    }
}
