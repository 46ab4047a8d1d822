use std::collections::VecDeque;

use rendezvous_model::{Endpoint, Message};

/// Senders blocked on one endpoint, in arrival order.
///
/// Each blocked sender owns at most one entry, since an endpoint has at most
/// one call outstanding.
#[derive(Debug, Default)]
pub(crate) struct SenderQueue {
    entries: VecDeque<QueuedSend>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuedSend {
    pub sender: Endpoint,
    pub message: Message,
}

impl SenderQueue {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn push(&mut self, sender: Endpoint, message: Message) {
        debug_assert!(!self.contains(sender));
        self.entries.push_back(QueuedSend { sender, message });
    }
    /// Removes the earliest entry whose sender satisfies `predicate`.
    pub fn take_first(&mut self, predicate: impl Fn(Endpoint) -> bool) -> Option<QueuedSend> {
        let position = self
            .entries
            .iter()
            .position(|entry| predicate(entry.sender))?;
        self.entries.remove(position)
    }
    pub fn remove(&mut self, sender: Endpoint) -> Option<QueuedSend> {
        self.take_first(|queued| queued == sender)
    }
    pub fn contains(&self, sender: Endpoint) -> bool {
        self.entries.iter().any(|entry| entry.sender == sender)
    }
    pub fn drain(&mut self) -> impl Iterator<Item = QueuedSend> + '_ {
        self.entries.drain(..)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn message(tag: u8) -> Message {
        let mut m = Message::new(0);
        m.set_u8(0, tag);
        m
    }

    #[test]
    fn first_match_wins() {
        let mut queue = SenderQueue::new();
        queue.push(Endpoint::new(3), message(3));
        queue.push(Endpoint::new(1), message(1));
        queue.push(Endpoint::new(2), message(2));

        let any = queue.take_first(|s| Endpoint::ANY.accepts(s)).unwrap();
        assert_eq!(any.sender, Endpoint::new(3));

        let two = queue.take_first(|s| Endpoint::new(2).accepts(s)).unwrap();
        assert_eq!(two.message.u8_at(0), Some(2));
        assert_eq!(queue.len(), 1);
        assert!(queue.take_first(|s| s == Endpoint::new(9)).is_none());
    }

    #[test]
    fn remove_and_drain() {
        let mut queue = SenderQueue::new();
        queue.push(Endpoint::new(1), message(1));
        queue.push(Endpoint::new(2), message(2));
        assert!(queue.remove(Endpoint::new(1)).is_some());
        assert!(!queue.contains(Endpoint::new(1)));
        let drained: Vec<_> = queue.drain().map(|e| e.sender).collect();
        assert_eq!(drained, vec![Endpoint::new(2)]);
        assert!(queue.is_empty());
    }
}
