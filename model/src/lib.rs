pub mod call;
pub mod endpoint;
pub mod errno;
pub mod error;
pub mod message;

pub use call::IpcCall;
pub use endpoint::Endpoint;
pub use error::IpcError;
pub use message::{Message, MessagePayload, MESSAGE_SIZE, PAYLOAD_SIZE};
