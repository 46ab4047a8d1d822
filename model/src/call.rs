use serde::{Deserialize, Serialize};

/// Primitive call selected by call number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Decode, bincode::Encode))]
#[repr(u64)]
pub enum IpcCall {
    /// Blocking send.
    Send = 1,
    /// Blocking receive.
    Receive = 2,
    /// Send, then receive the reply into the same buffer.
    SendReceive = 3,
    /// Send only if the peer is already waiting.
    SendNonBlocking = 5,
}

impl IpcCall {
    pub fn try_from_u64(v: u64) -> Option<Self> {
        match v {
            1 => Some(IpcCall::Send),
            2 => Some(IpcCall::Receive),
            3 => Some(IpcCall::SendReceive),
            5 => Some(IpcCall::SendNonBlocking),
            _ => None,
        }
    }
    pub fn number(&self) -> u64 {
        *self as u64
    }
}

impl std::fmt::Display for IpcCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpcCall::Send => write!(f, "SEND"),
            IpcCall::Receive => write!(f, "RECEIVE"),
            IpcCall::SendReceive => write!(f, "SENDREC"),
            IpcCall::SendNonBlocking => write!(f, "SENDNB"),
        }
    }
}
