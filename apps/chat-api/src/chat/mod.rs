//! The chat core: everything that owns room state.

pub mod coordinator;
pub mod events;
pub mod limiter;
pub mod log;
pub mod registry;
pub mod sink;
pub mod validation;

pub use coordinator::SessionCoordinator;
pub use events::{InboundEvent, JoinSuccess, ServerEvent};
pub use log::{ChatMessage, LogStatistics};
pub use registry::Participant;
