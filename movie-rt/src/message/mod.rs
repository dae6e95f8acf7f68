//! Message trait, type-erased wrapper, and the global message registry.

pub mod registry;
pub mod traits;

pub use registry::{register_message, AnyMessage, MessageRegistry};
pub use traits::Message;
