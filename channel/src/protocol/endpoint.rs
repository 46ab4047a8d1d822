use std::{ops::Deref, sync::Arc};

use rendezvous_model::{errno, Endpoint, IpcCall, IpcError, Message};

use super::{
    kernel::{
        pending::{Delivery, PendingHandle},
        state::{Caller, Outcome},
        Kernel, KernelRef,
    },
    process::ExitStatus,
};

#[derive(Debug)]
pub struct LocalEndpointInner {
    pub(crate) kernel: KernelRef,
    pub(crate) address: Endpoint,
    pub(crate) incarnation: u64,
    pub(crate) name: String,
}

impl Drop for LocalEndpointInner {
    fn drop(&mut self) {
        let Some(kernel) = self.kernel.upgrade() else {
            return;
        };
        if kernel
            .terminate(self.address, Some(self.incarnation), ExitStatus::Dropped)
            .is_some()
        {
            tracing::debug!(endpoint = %self.address, name = %self.name, "endpoint handle dropped");
        }
    }
}

/// Handle through which a task acts as one endpoint.
///
/// Clones share the endpoint; it terminates when the last clone is dropped or
/// when [`LocalEndpoint::exit`] is called.
#[derive(Debug, Clone)]
pub struct LocalEndpoint {
    pub(crate) inner: Arc<LocalEndpointInner>,
}

impl Deref for LocalEndpoint {
    type Target = LocalEndpointInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl LocalEndpoint {
    pub fn endpoint(&self) -> Endpoint {
        self.address
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kernel(&self) -> Option<Kernel> {
        self.kernel.upgrade()
    }
    fn caller(&self) -> Caller {
        Caller {
            endpoint: self.address,
            incarnation: self.incarnation,
        }
    }
    fn kernel_or_terminated(&self) -> Result<Kernel, IpcError> {
        self.kernel.upgrade().ok_or(IpcError::Terminated)
    }
    async fn settle(&self, kernel: &Kernel, outcome: Outcome) -> Result<Delivery, IpcError> {
        match outcome {
            Outcome::Done(delivery) => Ok(delivery),
            Outcome::Blocked { ticket, result } => {
                PendingHandle::new(kernel.reference(), self.address, ticket, result).await
            }
        }
    }

    /// Blocks until `peer` accepts `message`.
    pub async fn send(&self, peer: Endpoint, message: &Message) -> Result<(), IpcError> {
        let kernel = self.kernel_or_terminated()?;
        let outcome = kernel.lock().send(self.caller(), peer, *message);
        let outcome = outcome.inspect_err(|error| {
            tracing::trace!(endpoint = %self.address, %peer, %error, "send rejected")
        })?;
        self.settle(&kernel, outcome).await.map(|_| ())
    }

    /// Blocks until `peer` (or anyone, for [`Endpoint::ANY`]) sends, then
    /// overwrites `message` with what was sent.
    pub async fn receive(&self, peer: Endpoint, message: &mut Message) -> Result<(), IpcError> {
        let kernel = self.kernel_or_terminated()?;
        let outcome = kernel.lock().receive(self.caller(), peer);
        let outcome = outcome.inspect_err(|error| {
            tracing::trace!(endpoint = %self.address, %peer, %error, "receive rejected")
        })?;
        self.accept(self.settle(&kernel, outcome).await?, message);
        Ok(())
    }

    /// Sends `message` to `peer`, then receives the answer from `peer` into
    /// the same buffer. If the send fails the buffer is left untouched.
    pub async fn send_receive(&self, peer: Endpoint, message: &mut Message) -> Result<(), IpcError> {
        let kernel = self.kernel_or_terminated()?;
        let outcome = kernel.lock().send_receive(self.caller(), peer, *message);
        let outcome = outcome.inspect_err(|error| {
            tracing::trace!(endpoint = %self.address, %peer, %error, "send_receive rejected")
        })?;
        self.accept(self.settle(&kernel, outcome).await?, message);
        Ok(())
    }

    /// Delivers only if `peer` is already waiting for the caller, otherwise
    /// fails with [`IpcError::NotReady`] without blocking.
    pub fn try_send(&self, peer: Endpoint, message: &Message) -> Result<(), IpcError> {
        let kernel = self.kernel_or_terminated()?;
        let mut state = kernel.lock();
        state.try_send(self.caller(), peer, *message)
    }

    pub async fn call(
        &self,
        call: IpcCall,
        peer: Endpoint,
        message: &mut Message,
    ) -> Result<(), IpcError> {
        tracing::trace!(endpoint = %self.address, %call, %peer, "ipc call");
        match call {
            IpcCall::Send => self.send(peer, message).await,
            IpcCall::Receive => self.receive(peer, message).await,
            IpcCall::SendReceive => self.send_receive(peer, message).await,
            IpcCall::SendNonBlocking => self.try_send(peer, message),
        }
    }

    /// Numeric entry point: returns `errno::OK` or a negative errno.
    pub async fn ipc_call(&self, call: u64, peer: Endpoint, message: &mut Message) -> i32 {
        let result = match IpcCall::try_from_u64(call) {
            Some(call) => self.call(call, peer, message).await,
            None => Err(IpcError::BadCall),
        };
        match result {
            Ok(()) => errno::OK,
            Err(error) => error.errno(),
        }
    }

    /// Terminates the endpoint with `status`. Handles still held elsewhere
    /// can no longer make calls.
    pub fn exit(self, status: ExitStatus) {
        if let Some(kernel) = self.kernel.upgrade() {
            kernel.terminate(self.address, Some(self.incarnation), status);
        }
    }

    fn accept(&self, delivery: Delivery, message: &mut Message) {
        match delivery {
            Delivery::Received(received) => *message = received,
            Delivery::Sent => {
                tracing::warn!(endpoint = %self.address, "receive completed without a message")
            }
        }
    }
}
