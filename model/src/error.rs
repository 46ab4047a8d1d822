use serde::{Deserialize, Serialize};

use crate::errno;

/// Failure of a primitive call. The caller is never left blocked when one of
/// these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Decode, bincode::Encode))]
pub enum IpcError {
    /// The peer does not exist or has terminated.
    InvalidPeer,
    /// The call would never complete: the peer is the caller itself, or the
    /// peer is (transitively) blocked on the caller.
    WouldDeadlock,
    /// The endpoint already has a call outstanding.
    AlreadyPending,
    /// Non-blocking send found no receiver waiting.
    NotReady,
    /// `ANY` was used where a concrete peer is required.
    InvalidArgument,
    /// Unknown or unsupported call number.
    BadCall,
    /// The calling endpoint itself has exited or was killed.
    Terminated,
}

impl IpcError {
    pub fn errno(&self) -> i32 {
        match self {
            IpcError::InvalidPeer => errno::EDEADSRCDST,
            IpcError::WouldDeadlock => errno::ELOCKED,
            IpcError::AlreadyPending => errno::EBUSY,
            IpcError::NotReady => errno::ENOTREADY,
            IpcError::InvalidArgument => errno::EINVAL,
            IpcError::BadCall => errno::EBADCALL,
            IpcError::Terminated => errno::ESRCH,
        }
    }
    pub fn from_errno(code: i32) -> Option<Self> {
        match code {
            errno::EDEADSRCDST => Some(IpcError::InvalidPeer),
            errno::ELOCKED => Some(IpcError::WouldDeadlock),
            errno::EBUSY => Some(IpcError::AlreadyPending),
            errno::ENOTREADY => Some(IpcError::NotReady),
            errno::EINVAL => Some(IpcError::InvalidArgument),
            errno::EBADCALL => Some(IpcError::BadCall),
            errno::ESRCH => Some(IpcError::Terminated),
            _ => None,
        }
    }
}

impl std::fmt::Display for IpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpcError::InvalidPeer => write!(f, "invalid peer"),
            IpcError::WouldDeadlock => write!(f, "call would deadlock"),
            IpcError::AlreadyPending => write!(f, "a call is already pending"),
            IpcError::NotReady => write!(f, "peer not ready"),
            IpcError::InvalidArgument => write!(f, "invalid argument"),
            IpcError::BadCall => write!(f, "bad call number"),
            IpcError::Terminated => write!(f, "endpoint terminated"),
        }
    }
}

impl std::error::Error for IpcError {}
