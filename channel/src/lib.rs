pub mod error;
pub mod event_handler;
pub mod protocol;

pub use error::Error;
pub use rendezvous_model as model;
pub type Result<T> = std::result::Result<T, Error>;
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::event_handler::{HandleRequestLoop, Reply};
    pub use crate::model::*;
    pub use crate::protocol::endpoint::LocalEndpoint;
    pub use crate::protocol::kernel::{
        process_table::{EndpointState, PendingKind},
        Kernel, KernelConfig, KernelRef,
    };
    pub use crate::protocol::process::{ExitRecord, ExitStatus, ProcessHandle};
}
