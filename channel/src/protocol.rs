pub mod endpoint;
pub mod kernel;
pub mod process;
