use serde::{Deserialize, Serialize};

use crate::Endpoint;

/// Size of a whole message, in bytes.
pub const MESSAGE_SIZE: usize = 64;
/// Bytes left for the payload after `source` and `m_type`.
pub const PAYLOAD_SIZE: usize = MESSAGE_SIZE - 8;

/// Opaque, fixed-size payload storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bincode", derive(bincode::Decode, bincode::Encode))]
pub struct MessagePayload(pub [u8; PAYLOAD_SIZE]);

impl Default for MessagePayload {
    fn default() -> Self {
        Self([0; PAYLOAD_SIZE])
    }
}

impl From<[u8; PAYLOAD_SIZE]> for MessagePayload {
    fn from(bytes: [u8; PAYLOAD_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for MessagePayload {
    type Error = std::array::TryFromSliceError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Ok(Self(bytes.try_into()?))
    }
}

impl std::fmt::Debug for MessagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // trailing zeros are noise in logs
        let used = self.0.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
        f.write_str("MessagePayload(")?;
        for b in &self.0[..used] {
            write!(f, "{b:02x}")?;
        }
        f.write_str(")")
    }
}

impl Serialize for MessagePayload {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            use base64::Engine;
            serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct PayloadBytesVisitor;

impl<'de> serde::de::Visitor<'de> for PayloadBytesVisitor {
    type Value = Vec<u8>;
    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{PAYLOAD_SIZE} payload bytes")
    }
    fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }
    fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }
    fn visit_seq<A: serde::de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut bytes = Vec::with_capacity(PAYLOAD_SIZE);
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        Ok(bytes)
    }
}

impl<'de> Deserialize<'de> for MessagePayload {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let bytes = if deserializer.is_human_readable() {
            use base64::Engine;
            let s = String::deserialize(deserializer)?;
            base64::engine::general_purpose::STANDARD
                .decode(s.as_bytes())
                .map_err(D::Error::custom)?
        } else {
            deserializer.deserialize_bytes(PayloadBytesVisitor)?
        };
        Self::try_from(bytes.as_slice())
            .map_err(|_| D::Error::invalid_length(bytes.len(), &PayloadBytesVisitor))
    }
}

/// A fixed-layout message.
///
/// The payload is one 56-byte buffer; the typed accessors below are views of
/// that same storage, little-endian, indexed in units of their own width
/// (`u32_at(1)` covers payload bytes 4..8). Indices past the end are simply
/// out of reach and yield `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "bincode", derive(bincode::Decode, bincode::Encode))]
pub struct Message {
    /// The sending endpoint, stamped on delivery.
    pub source: Endpoint,
    pub m_type: i32,
    pub payload: MessagePayload,
}

macro_rules! overlay_accessors {
    ($($get:ident, $set:ident: $T:ty;)*) => {
        $(
            pub fn $get(&self, index: usize) -> Option<$T> {
                const WIDTH: usize = std::mem::size_of::<$T>();
                let start = index.checked_mul(WIDTH)?;
                let bytes = self.payload.0.get(start..start.checked_add(WIDTH)?)?;
                Some(<$T>::from_le_bytes(bytes.try_into().ok()?))
            }
            pub fn $set(&mut self, index: usize, value: $T) -> Option<()> {
                const WIDTH: usize = std::mem::size_of::<$T>();
                let start = index.checked_mul(WIDTH)?;
                let slot = self.payload.0.get_mut(start..start.checked_add(WIDTH)?)?;
                slot.copy_from_slice(&value.to_le_bytes());
                Some(())
            }
        )*
    };
}

impl Message {
    pub fn new(m_type: i32) -> Self {
        Self {
            source: Endpoint::NONE,
            m_type,
            payload: MessagePayload::default(),
        }
    }
    pub fn data(&self) -> &[u8; PAYLOAD_SIZE] {
        &self.payload.0
    }
    pub fn data_mut(&mut self) -> &mut [u8; PAYLOAD_SIZE] {
        &mut self.payload.0
    }
    overlay_accessors! {
        u8_at, set_u8: u8;
        u16_at, set_u16: u16;
        u32_at, set_u32: u32;
        i32_at, set_i32: i32;
        u64_at, set_u64: u64;
        i64_at, set_i64: i64;
    }
    /// The fixed wire layout: source, m_type, payload.
    pub fn to_bytes(&self) -> [u8; MESSAGE_SIZE] {
        let mut bytes = [0; MESSAGE_SIZE];
        bytes[0..4].copy_from_slice(&self.source.id().to_le_bytes());
        bytes[4..8].copy_from_slice(&self.m_type.to_le_bytes());
        bytes[8..].copy_from_slice(&self.payload.0);
        bytes
    }
    pub fn from_bytes(bytes: &[u8; MESSAGE_SIZE]) -> Self {
        let mut source = [0; 4];
        source.copy_from_slice(&bytes[0..4]);
        let mut m_type = [0; 4];
        m_type.copy_from_slice(&bytes[4..8]);
        let mut payload = [0; PAYLOAD_SIZE];
        payload.copy_from_slice(&bytes[8..]);
        Self {
            source: Endpoint::new(i32::from_le_bytes(source)),
            m_type: i32::from_le_bytes(m_type),
            payload: MessagePayload(payload),
        }
    }
}
