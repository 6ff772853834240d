//! Topic registry and typed handler erasure.
//!
//! Handlers declare their payload type once, as an associated type. At
//! registration the handler is wrapped in an adapter that knows how to decode
//! that type, so dispatch only ever sees `TopicDescriptor::invoke` and never
//! inspects types at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use switchyard_core::{DispatchError, Envelope, HandlerError};
use tracing::{debug, warn};

use super::context::TopicContext;

/// Trait implemented by every topic handler.
#[async_trait]
pub trait TopicHandler: Send + Sync + 'static {
    /// Type the envelope body is decoded into.
    type Payload: DeserializeOwned + Send + 'static;

    /// Whether a frame without a body is a decode error. Defaults to `false`,
    /// in which case the handler receives `None`.
    fn requires_body(&self) -> bool {
        false
    }

    /// Handle one frame. Runs to completion before the connection's next frame.
    async fn handle(
        &self,
        ctx: &TopicContext,
        payload: Option<Self::Payload>,
    ) -> Result<(), HandlerError>;
}

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn invoke(
        &self,
        topic: &str,
        ctx: &TopicContext,
        envelope: &Envelope,
    ) -> Result<(), DispatchError>;
}

struct Typed<H>(H);

#[async_trait]
impl<H: TopicHandler> ErasedHandler for Typed<H> {
    async fn invoke(
        &self,
        topic: &str,
        ctx: &TopicContext,
        envelope: &Envelope,
    ) -> Result<(), DispatchError> {
        let payload = envelope
            .payload::<H::Payload>()
            .map_err(|e| DispatchError::PayloadDecode {
                topic: topic.to_owned(),
                reason: e.to_string(),
            })?;

        if payload.is_none() && self.0.requires_body() {
            return Err(DispatchError::PayloadDecode {
                topic: topic.to_owned(),
                reason: "body is required".into(),
            });
        }

        self.0
            .handle(ctx, payload)
            .await
            .map_err(|e| DispatchError::HandlerFailure {
                topic: topic.to_owned(),
                message: e.to_string(),
            })
    }
}

/// A registered handler together with its topic and payload type.
pub struct TopicDescriptor {
    topic: String,
    payload_type: &'static str,
    handler: Box<dyn ErasedHandler>,
}

impl TopicDescriptor {
    /// Wrap a typed handler.
    pub fn new<H: TopicHandler>(topic: impl Into<String>, handler: H) -> Self {
        Self {
            topic: topic.into(),
            payload_type: std::any::type_name::<H::Payload>(),
            handler: Box::new(Typed(handler)),
        }
    }

    /// Topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Rust type name of the handler's payload.
    pub fn payload_type(&self) -> &'static str {
        self.payload_type
    }

    /// Decode the envelope body and run the handler.
    ///
    /// Decode failures come back as [`DispatchError::PayloadDecode`] without
    /// running the handler; handler errors as [`DispatchError::HandlerFailure`].
    pub async fn invoke(&self, ctx: &TopicContext, envelope: &Envelope) -> Result<(), DispatchError> {
        self.handler.invoke(&self.topic, ctx, envelope).await
    }
}

impl std::fmt::Debug for TopicDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicDescriptor")
            .field("topic", &self.topic)
            .field("payload_type", &self.payload_type)
            .finish_non_exhaustive()
    }
}

/// Registry mapping topic names to handlers.
///
/// Filled at startup; safe to register concurrently with lookups.
#[derive(Default)]
pub struct TopicRegistry {
    handlers: RwLock<HashMap<String, Arc<TopicDescriptor>>>,
}

impl TopicRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic, replacing any existing one.
    ///
    /// Returns `true` when a previous handler was replaced.
    pub fn register<H: TopicHandler>(&self, topic: &str, handler: H) -> bool {
        self.register_descriptor(TopicDescriptor::new(topic, handler))
    }

    /// Register a prebuilt descriptor, replacing any existing one.
    pub fn register_descriptor(&self, descriptor: TopicDescriptor) -> bool {
        let topic = descriptor.topic.clone();
        let payload_type = descriptor.payload_type;
        let replaced = self
            .handlers
            .write()
            .insert(topic.clone(), Arc::new(descriptor))
            .is_some();
        if replaced {
            warn!(topic, payload_type, "topic handler replaced");
        } else {
            debug!(topic, payload_type, "topic handler registered");
        }
        replaced
    }

    /// Current handler for a topic.
    pub fn lookup(&self, topic: &str) -> Option<Arc<TopicDescriptor>> {
        self.handlers.read().get(topic).cloned()
    }

    /// List all registered topics (sorted).
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a topic is registered.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.handlers.read().contains_key(topic)
    }

    /// Number of registered topics.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no topic is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}
