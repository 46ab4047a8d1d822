use serde::{Deserialize, Serialize};

/// Identifier of a communicating party.
///
/// Identifiers are handed out by whoever registers the party; the channel
/// only compares them and looks them up.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "bincode", derive(bincode::Decode, bincode::Encode))]
pub struct Endpoint(pub i32);

const GENERATION_SHIFT: i32 = 15;
const GENERATION_SIZE: i32 = 1 << GENERATION_SHIFT;
const MAX_TASKS: i32 = 1023;
const SLOT_TOP: i32 = GENERATION_SIZE - MAX_TASKS;

impl Endpoint {
    /// Accept a message from any sender. Only valid as the source of a receive.
    pub const ANY: Self = Self(SLOT_TOP - 1);
    /// No endpoint at all, e.g. the source of a message nobody sent yet.
    pub const NONE: Self = Self(SLOT_TOP - 2);
    /// The calling endpoint itself.
    pub const SELF: Self = Self(SLOT_TOP - 3);

    pub const fn new(id: i32) -> Self {
        Self(id)
    }
    pub const fn id(&self) -> i32 {
        self.0
    }
    pub const fn is_any(&self) -> bool {
        self.0 == Self::ANY.0
    }
    /// `ANY`, `NONE` and `SELF` never name a live party.
    pub const fn is_reserved(&self) -> bool {
        self.0 == Self::ANY.0 || self.0 == Self::NONE.0 || self.0 == Self::SELF.0
    }
    /// Whether a receive waiting on `self` accepts a message from `sender`.
    pub fn accepts(&self, sender: Endpoint) -> bool {
        self.is_any() || *self == sender
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Endpoint::NONE
    }
}

impl From<i32> for Endpoint {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<Endpoint> for i32 {
    fn from(val: Endpoint) -> Self {
        val.0
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ANY => f.write_str("Endpoint(ANY)"),
            Self::NONE => f.write_str("Endpoint(NONE)"),
            Self::SELF => f.write_str("Endpoint(SELF)"),
            Self(id) => f.debug_tuple("Endpoint").field(&id).finish(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ANY => f.write_str("ANY"),
            Self::NONE => f.write_str("NONE"),
            Self::SELF => f.write_str("SELF"),
            Self(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reserved_endpoints() {
        assert_eq!(Endpoint::ANY.id(), 31744);
        assert_eq!(Endpoint::NONE.id(), 31743);
        assert_eq!(Endpoint::SELF.id(), 31742);
        assert!(Endpoint::SELF.is_reserved());
        assert!(!Endpoint::new(40).is_reserved());
    }

    #[test]
    fn any_accepts_everyone() {
        assert!(Endpoint::ANY.accepts(Endpoint::new(7)));
        assert!(Endpoint::new(7).accepts(Endpoint::new(7)));
        assert!(!Endpoint::new(7).accepts(Endpoint::new(8)));
        assert_eq!(format!("{:?}", Endpoint::ANY), "Endpoint(ANY)");
    }
}
