//! A request/reply loop on top of the channel. The user registers one handler
//! per message type and the loop answers every request with the handler's
//! reply.
use crate::protocol::endpoint::LocalEndpoint;
use rendezvous_model::{errno, Endpoint, IpcError, Message};
use std::{collections::HashMap, future::Future, pin::Pin};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// What a handler answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Message(Message),
    /// Leave the requester blocked; someone else answers later, or nobody.
    None,
}

impl From<Message> for Reply {
    fn from(message: Message) -> Self {
        Reply::Message(message)
    }
}

type InnerRequestHandler =
    dyn Fn(Message) -> Pin<Box<dyn Future<Output = Reply> + Send>> + Send + Sync;

pub struct HandleRequestLoop {
    ep: LocalEndpoint,
    handlers: HashMap<i32, Box<InnerRequestHandler>>,
}

impl std::fmt::Debug for HandleRequestLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRequestLoop")
            .field("ep", &self.ep.endpoint())
            .field("m_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandleRequestLoop {
    pub fn new(ep: LocalEndpoint) -> Self {
        Self {
            ep,
            handlers: Default::default(),
        }
    }
    pub fn with_handler<H, Fut>(mut self, m_type: i32, handler: H) -> Self
    where
        H: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        self.register_handler(m_type, handler);
        self
    }

    pub fn register_handler<H, Fut>(&mut self, m_type: i32, handler: H)
    where
        H: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Reply> + Send + 'static,
    {
        tracing::debug!(m_type, "register request handler");
        let inner_handler = Box::new(move |message: Message| {
            Box::pin(handler(message)) as Pin<Box<dyn Future<Output = Reply> + Send>>
        });
        if self.handlers.insert(m_type, inner_handler).is_some() {
            tracing::warn!(m_type, "request handler replaced");
        }
    }

    /// Serves requests until receiving fails. A terminated endpoint ends the
    /// loop with `Ok`.
    pub async fn run(self) -> Result<(), IpcError> {
        loop {
            let mut request = Message::default();
            match self.ep.receive(Endpoint::ANY, &mut request).await {
                Ok(()) => {}
                Err(IpcError::Terminated) => return Ok(()),
                Err(e) => return Err(e),
            }
            if !self.handle(request).await {
                return Ok(());
            }
        }
    }

    /// Like [`HandleRequestLoop::run`], but also stops once `ct` is cancelled.
    /// A receive still waiting at that moment is withdrawn.
    pub async fn run_until_cancelled(self, ct: CancellationToken) -> Result<(), IpcError> {
        tokio::select! {
            result = self.run() => result,
            _ = ct.cancelled() => {
                tracing::debug!("request loop cancelled");
                Ok(())
            }
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<Result<(), IpcError>> {
        tokio::spawn(self.run())
    }

    /// Returns `false` once the endpoint itself is gone.
    async fn handle(&self, request: Message) -> bool {
        let client = request.source;
        let m_type = request.m_type;
        tracing::trace!(%client, m_type, "handle request");
        let reply = match self.handlers.get(&m_type) {
            Some(handler) => {
                (handler)(request)
                    .instrument(tracing::info_span!("request_handler", m_type, %client))
                    .await
            }
            None => {
                tracing::debug!(m_type, "no handler found");
                Reply::Message(Message::new(errno::ENOSYS))
            }
        };
        let Reply::Message(reply) = reply else {
            return true;
        };
        match self.ep.try_send(client, &reply) {
            Ok(()) => true,
            Err(IpcError::Terminated) => false,
            Err(error) => {
                tracing::warn!(%client, m_type, %error, "failed to deliver reply");
                true
            }
        }
    }
}

impl LocalEndpoint {
    pub fn create_request_loop(&self) -> HandleRequestLoop {
        HandleRequestLoop::new(self.clone())
    }
}
