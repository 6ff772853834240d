//! `echo`: sends the body back to the sender on the same topic.

use async_trait::async_trait;
use serde_json::Value;
use switchyard_core::HandlerError;

use crate::topics::context::TopicContext;
use crate::topics::registry::TopicHandler;

/// Topic name.
pub const TOPIC: &str = "echo";

/// Replies with the decoded body, or a `null` body when none was sent.
pub struct EchoHandler;

#[async_trait]
impl TopicHandler for EchoHandler {
    type Payload = Value;

    async fn handle(&self, ctx: &TopicContext, payload: Option<Value>) -> Result<(), HandlerError> {
        ctx.reply(TOPIC, &payload)?;
        Ok(())
    }
}
