//! Topic routing: handler trait, registry, per-call context, and the
//! built-in handlers.

pub mod context;
pub mod handlers;
pub mod registry;

pub use context::TopicContext;
pub use registry::{TopicDescriptor, TopicHandler, TopicRegistry};
