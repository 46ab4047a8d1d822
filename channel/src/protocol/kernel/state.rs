//! The rendezvous state machine.
//!
//! Every method here runs with the kernel lock held, so a match, the copy of
//! the message and the state change of both parties form one step.

use rendezvous_model::{Endpoint, IpcError, Message};
use tokio::sync::oneshot;

use crate::protocol::process::{ExitRecord, ExitStatus};

use super::{
    pending::{Delivery, DeliveryResult, Resolver},
    process_table::{PendingKind, PendingOp, ProcessTable},
    KernelConfig,
};

/// Identifies the calling endpoint, and which registration of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Caller {
    pub endpoint: Endpoint,
    pub incarnation: u64,
}

pub(crate) enum Outcome {
    /// Matched immediately.
    Done(Delivery),
    /// Registered as pending; completes through `result`.
    Blocked {
        ticket: u64,
        result: oneshot::Receiver<DeliveryResult>,
    },
}

#[derive(Debug)]
pub(crate) struct IpcState {
    pub(crate) table: ProcessTable,
    next_ticket: u64,
    deadlock_detection: bool,
}

impl IpcState {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            table: ProcessTable::new(config.max_processes),
            next_ticket: 0,
            deadlock_detection: config.deadlock_detection,
        }
    }

    pub fn send(
        &mut self,
        caller: Caller,
        peer: Endpoint,
        message: Message,
    ) -> Result<Outcome, IpcError> {
        self.ensure_idle(caller)?;
        let peer = self.resolve_peer(caller, peer, false)?;
        if self.try_deliver(caller.endpoint, peer, message) {
            return Ok(Outcome::Done(Delivery::Sent));
        }
        self.check_deadlock(caller.endpoint, PendingKind::Send, peer)?;
        self.enqueue(caller.endpoint, peer, message)?;
        self.block(caller, PendingKind::Send, peer)
    }

    pub fn try_send(
        &mut self,
        caller: Caller,
        peer: Endpoint,
        message: Message,
    ) -> Result<(), IpcError> {
        self.ensure_idle(caller)?;
        let peer = self.resolve_peer(caller, peer, false)?;
        if self.try_deliver(caller.endpoint, peer, message) {
            Ok(())
        } else {
            Err(IpcError::NotReady)
        }
    }

    pub fn receive(&mut self, caller: Caller, source: Endpoint) -> Result<Outcome, IpcError> {
        self.ensure_idle(caller)?;
        let source = self.resolve_peer(caller, source, true)?;
        if let Some(message) = self.take_queued(caller.endpoint, source) {
            return Ok(Outcome::Done(Delivery::Received(message)));
        }
        self.check_deadlock(caller.endpoint, PendingKind::Receive, source)?;
        self.block(caller, PendingKind::Receive, source)
    }

    pub fn send_receive(
        &mut self,
        caller: Caller,
        peer: Endpoint,
        message: Message,
    ) -> Result<Outcome, IpcError> {
        self.ensure_idle(caller)?;
        let peer = self.resolve_peer(caller, peer, false)?;
        if self.try_deliver(caller.endpoint, peer, message) {
            // the send half is done, the receive half always follows
            if let Some(reply) = self.take_queued(caller.endpoint, peer) {
                return Ok(Outcome::Done(Delivery::Received(reply)));
            }
            self.check_deadlock(caller.endpoint, PendingKind::Receive, peer)?;
            return self.block(caller, PendingKind::Receive, peer);
        }
        self.check_deadlock(caller.endpoint, PendingKind::SendReceive, peer)?;
        self.enqueue(caller.endpoint, peer, message)?;
        self.block(caller, PendingKind::SendReceive, peer)
    }

    /// Withdraws the pending operation identified by `ticket`, if it is still
    /// outstanding.
    pub fn cancel(&mut self, endpoint: Endpoint, ticket: u64) -> bool {
        let Some(slot) = self.table.get_mut(endpoint) else {
            return false;
        };
        if !matches!(&slot.pending, Some(pending) if pending.ticket == ticket) {
            return false;
        }
        let Some(pending) = slot.pending.take() else {
            return false;
        };
        self.withdraw_send(endpoint, &pending);
        tracing::debug!(%endpoint, kind = ?pending.kind, peer = %pending.peer, "pending call withdrawn");
        true
    }

    /// Removes the endpoint. Everyone who can only make progress through it
    /// fails with `InvalidPeer`.
    pub fn terminate(
        &mut self,
        endpoint: Endpoint,
        incarnation: Option<u64>,
        status: ExitStatus,
    ) -> Option<ExitRecord> {
        if let Some(incarnation) = incarnation {
            self.table.get_incarnation(endpoint, incarnation)?;
        }
        let mut slot = self.table.remove(endpoint)?;
        tracing::debug!(%endpoint, name = %slot.name, %status, "endpoint terminated");
        if let Some(pending) = slot.pending.take() {
            self.withdraw_send(endpoint, &pending);
        }
        if !slot.senders.is_empty() {
            tracing::trace!(%endpoint, count = slot.senders.len(), "failing queued senders");
        }
        for queued in slot.senders.drain() {
            self.fail(queued.sender, IpcError::InvalidPeer);
        }
        for receiver in self.table.receivers_waiting_on(endpoint) {
            self.fail(receiver, IpcError::InvalidPeer);
        }
        if let Some(task) = slot.task.take() {
            if status == ExitStatus::Killed {
                task.abort();
            }
        }
        let record = ExitRecord::new(status);
        self.table.record_exit(endpoint, record.clone());
        slot.exit.send(status);
        Some(record)
    }

    fn ensure_idle(&self, caller: Caller) -> Result<(), IpcError> {
        let slot = self
            .table
            .get_incarnation(caller.endpoint, caller.incarnation)
            .ok_or(IpcError::Terminated)?;
        if slot.pending.is_some() {
            return Err(IpcError::AlreadyPending);
        }
        Ok(())
    }

    fn resolve_peer(
        &self,
        caller: Caller,
        peer: Endpoint,
        allow_any: bool,
    ) -> Result<Endpoint, IpcError> {
        if peer == Endpoint::SELF || peer == caller.endpoint {
            return Err(IpcError::WouldDeadlock);
        }
        if peer.is_any() {
            return if allow_any {
                Ok(peer)
            } else {
                Err(IpcError::InvalidArgument)
            };
        }
        if !self.table.contains(peer) {
            return Err(IpcError::InvalidPeer);
        }
        Ok(peer)
    }

    /// Hands `message` straight to `receiver` if it is blocked accepting
    /// `sender`.
    fn try_deliver(&mut self, sender: Endpoint, receiver: Endpoint, message: Message) -> bool {
        let Some(slot) = self.table.get_mut(receiver) else {
            return false;
        };
        let accepts = matches!(
            &slot.pending,
            Some(pending) if pending.kind == PendingKind::Receive && pending.peer.accepts(sender)
        );
        if !accepts {
            return false;
        }
        let Some(pending) = slot.pending.take() else {
            return false;
        };
        let mut message = message;
        message.source = sender;
        tracing::trace!(%sender, %receiver, "rendezvous with blocked receiver");
        pending.resolver.resolve(Ok(Delivery::Received(message)));
        true
    }

    /// Takes the earliest queued message `receiver` accepts from `source`, and
    /// releases its sender.
    fn take_queued(&mut self, receiver: Endpoint, source: Endpoint) -> Option<Message> {
        let queued = self
            .table
            .get_mut(receiver)?
            .senders
            .take_first(|sender| source.accepts(sender))?;
        if let Some(slot) = self.table.get_mut(queued.sender) {
            match slot.pending.take() {
                Some(mut pending) if pending.kind == PendingKind::SendReceive => {
                    pending.kind = PendingKind::Receive;
                    slot.pending = Some(pending);
                }
                Some(pending) => pending.resolver.resolve(Ok(Delivery::Sent)),
                None => tracing::warn!(sender = %queued.sender, "queued sender was not blocked"),
            }
        }
        tracing::trace!(sender = %queued.sender, %receiver, "rendezvous with queued sender");
        let mut message = queued.message;
        message.source = queued.sender;
        Some(message)
    }

    fn enqueue(&mut self, sender: Endpoint, receiver: Endpoint, message: Message) -> Result<(), IpcError> {
        self.table
            .get_mut(receiver)
            .ok_or(IpcError::InvalidPeer)?
            .senders
            .push(sender, message);
        Ok(())
    }

    fn block(&mut self, caller: Caller, kind: PendingKind, peer: Endpoint) -> Result<Outcome, IpcError> {
        let ticket = self.next_ticket;
        let slot = self
            .table
            .get_mut(caller.endpoint)
            .ok_or(IpcError::Terminated)?;
        self.next_ticket += 1;
        let (resolver, result) = Resolver::new(caller.endpoint);
        slot.pending = Some(PendingOp {
            kind,
            peer,
            ticket,
            resolver,
        });
        tracing::debug!(endpoint = %caller.endpoint, ?kind, %peer, "endpoint blocked");
        Ok(Outcome::Blocked { ticket, result })
    }

    fn fail(&mut self, endpoint: Endpoint, error: IpcError) {
        let Some(pending) = self
            .table
            .get_mut(endpoint)
            .and_then(|slot| slot.pending.take())
        else {
            return;
        };
        self.withdraw_send(endpoint, &pending);
        tracing::debug!(%endpoint, kind = ?pending.kind, peer = %pending.peer, %error, "pending call failed");
        pending.resolver.resolve(Err(error));
    }

    fn withdraw_send(&mut self, endpoint: Endpoint, pending: &PendingOp) {
        if pending.kind.is_sending() {
            if let Some(peer) = self.table.get_mut(pending.peer) {
                peer.senders.remove(endpoint);
            }
        }
    }

    /// Follows the chain of blocked endpoints starting at `target`. A chain
    /// leading back to `caller` can never be resolved.
    fn check_deadlock(
        &self,
        caller: Endpoint,
        kind: PendingKind,
        target: Endpoint,
    ) -> Result<(), IpcError> {
        if !self.deadlock_detection {
            return Ok(());
        }
        let mut group_size = 1;
        let mut next = target;
        for _ in 0..=self.table.len() {
            if next.is_any() {
                return Ok(());
            }
            let Some(pending) = self.table.get(next).and_then(|slot| slot.pending.as_ref()) else {
                return Ok(());
            };
            group_size += 1;
            if pending.peer == caller {
                // a sender and a receiver facing each other will rendezvous
                if group_size == 2 && pending.kind.is_sending() != kind.is_sending() {
                    return Ok(());
                }
                tracing::debug!(%caller, %target, group_size, "deadlock detected");
                return Err(IpcError::WouldDeadlock);
            }
            next = pending.peer;
        }
        Ok(())
    }
}
