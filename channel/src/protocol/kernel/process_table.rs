use std::collections::{BTreeMap, HashMap};

use rendezvous_model::Endpoint;
use serde::{Deserialize, Serialize};
use tokio::task::AbortHandle;

use crate::protocol::process::{ExitRecord, ExitSender, ProcessHandle};

use super::{pending::Resolver, sender_queue::SenderQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PendingKind {
    Send,
    Receive,
    /// The send half of a send-receive; the receive half follows without
    /// waking the caller.
    SendReceive,
}

impl PendingKind {
    pub fn is_sending(&self) -> bool {
        matches!(self, PendingKind::Send | PendingKind::SendReceive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointState {
    Idle,
    Blocked { kind: PendingKind, peer: Endpoint },
}

impl EndpointState {
    pub fn is_blocked(&self) -> bool {
        matches!(self, EndpointState::Blocked { .. })
    }
}

#[derive(Debug)]
pub(crate) struct PendingOp {
    pub kind: PendingKind,
    pub peer: Endpoint,
    pub ticket: u64,
    pub resolver: Resolver,
}

#[derive(Debug)]
pub(crate) struct ProcessSlot {
    pub name: String,
    pub incarnation: u64,
    pub pending: Option<PendingOp>,
    pub senders: SenderQueue,
    pub exit: ExitSender,
    pub task: Option<AbortHandle>,
}

impl ProcessSlot {
    pub fn state(&self) -> EndpointState {
        match &self.pending {
            None => EndpointState::Idle,
            Some(pending) => EndpointState::Blocked {
                kind: pending.kind,
                peer: pending.peer,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    OutOfRange { endpoint: Endpoint, capacity: usize },
    AlreadyRegistered(Endpoint),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterError::OutOfRange { endpoint, capacity } => {
                write!(f, "endpoint {endpoint} outside of 0..{capacity}")
            }
            RegisterError::AlreadyRegistered(endpoint) => {
                write!(f, "endpoint {endpoint} is already registered")
            }
        }
    }
}

impl std::error::Error for RegisterError {}

/// Live endpoints, plus the exit records of the ones that are gone.
#[derive(Debug)]
pub(crate) struct ProcessTable {
    slots: BTreeMap<Endpoint, ProcessSlot>,
    exited: HashMap<Endpoint, ExitRecord>,
    capacity: usize,
    next_incarnation: u64,
}

impl ProcessTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            exited: HashMap::new(),
            capacity,
            next_incarnation: 0,
        }
    }
    pub fn register(
        &mut self,
        endpoint: Endpoint,
        name: String,
    ) -> Result<(u64, ProcessHandle), RegisterError> {
        let in_range = usize::try_from(endpoint.id()).is_ok_and(|idx| idx < self.capacity);
        if !in_range {
            return Err(RegisterError::OutOfRange {
                endpoint,
                capacity: self.capacity,
            });
        }
        if self.slots.contains_key(&endpoint) {
            return Err(RegisterError::AlreadyRegistered(endpoint));
        }
        let incarnation = self.next_incarnation;
        self.next_incarnation += 1;
        let (exit, handle) = ProcessHandle::new(endpoint);
        self.exited.remove(&endpoint);
        self.slots.insert(
            endpoint,
            ProcessSlot {
                name,
                incarnation,
                pending: None,
                senders: SenderQueue::new(),
                exit,
                task: None,
            },
        );
        Ok((incarnation, handle))
    }
    pub fn get(&self, endpoint: Endpoint) -> Option<&ProcessSlot> {
        self.slots.get(&endpoint)
    }
    pub fn get_mut(&mut self, endpoint: Endpoint) -> Option<&mut ProcessSlot> {
        self.slots.get_mut(&endpoint)
    }
    /// The slot, but only if it still belongs to the given incarnation.
    pub fn get_incarnation(&self, endpoint: Endpoint, incarnation: u64) -> Option<&ProcessSlot> {
        self.get(endpoint)
            .filter(|slot| slot.incarnation == incarnation)
    }
    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.slots.contains_key(&endpoint)
    }
    pub fn remove(&mut self, endpoint: Endpoint) -> Option<ProcessSlot> {
        self.slots.remove(&endpoint)
    }
    pub fn record_exit(&mut self, endpoint: Endpoint, record: ExitRecord) {
        self.exited.insert(endpoint, record);
    }
    pub fn exit_record(&self, endpoint: Endpoint) -> Option<&ExitRecord> {
        self.exited.get(&endpoint)
    }
    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.slots.keys().copied()
    }
    /// Endpoints blocked in a receive that only `source` can satisfy.
    pub fn receivers_waiting_on(&self, source: Endpoint) -> Vec<Endpoint> {
        self.slots
            .iter()
            .filter(|(_, slot)| {
                matches!(
                    &slot.pending,
                    Some(pending) if pending.kind == PendingKind::Receive && pending.peer == source
                )
            })
            .map(|(endpoint, _)| *endpoint)
            .collect()
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}
