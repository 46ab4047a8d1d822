//! Lifecycle boundary: how an endpoint's termination is reported to whoever
//! started it.

use std::{future::Future, task::Poll};

use chrono::{DateTime, Utc};
use rendezvous_model::Endpoint;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitStatus {
    /// The endpoint called `exit` with this status.
    Exited(i32),
    /// Terminated by a supervisor.
    Killed,
    /// Every handle was dropped without calling `exit`.
    Dropped,
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with {code}"),
            ExitStatus::Killed => write!(f, "killed"),
            ExitStatus::Dropped => write!(f, "dropped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub status: ExitStatus,
    pub time: DateTime<Utc>,
}

impl ExitRecord {
    pub fn new(status: ExitStatus) -> Self {
        Self {
            status,
            time: Utc::now(),
        }
    }
}

pin_project_lite::pin_project! {
    /// Resolves to the endpoint's exit status once it terminates.
    #[derive(Debug)]
    pub struct ProcessHandle {
        pub(crate) endpoint: Endpoint,
        #[pin]
        pub(crate) exit: oneshot::Receiver<ExitStatus>,
    }
}

impl ProcessHandle {
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }
    pub(crate) fn new(endpoint: Endpoint) -> (ExitSender, ProcessHandle) {
        let (tx, rx) = oneshot::channel();
        (
            ExitSender::new(endpoint, tx),
            ProcessHandle { endpoint, exit: rx },
        )
    }
}

impl Future for ProcessHandle {
    type Output = ExitStatus;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        this.exit
            .poll(cx)
            .map(|status| status.unwrap_or(ExitStatus::Dropped))
    }
}

#[derive(Debug)]
pub(crate) struct ExitSender {
    endpoint: Endpoint,
    channel: Option<oneshot::Sender<ExitStatus>>,
}

impl ExitSender {
    pub fn new(endpoint: Endpoint, channel: oneshot::Sender<ExitStatus>) -> Self {
        Self {
            endpoint,
            channel: Some(channel),
        }
    }
    pub fn send(&mut self, status: ExitStatus) {
        if let Some(channel) = self.channel.take() {
            if channel.send(status).is_err() {
                tracing::trace!(endpoint = %self.endpoint, "nobody waits for exit status");
            }
        }
    }
}

impl Drop for ExitSender {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            tracing::warn!(
                endpoint = %self.endpoint,
                "exit sender dropped without reporting a status"
            );
            let _ = channel.send(ExitStatus::Dropped);
        }
    }
}
