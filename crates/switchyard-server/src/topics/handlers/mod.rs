//! Built-in topic handlers.

pub mod echo;
pub mod session_info;

use super::registry::TopicRegistry;

/// Register every built-in topic.
pub fn register_all(registry: &TopicRegistry) {
    let _ = registry.register(echo::TOPIC, echo::EchoHandler);
    let _ = registry.register(session_info::TOPIC, session_info::SessionInfoHandler);
}
