//! `session.info`: reports the caller's identity and timestamps.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::IgnoredAny;
use switchyard_core::HandlerError;
use switchyard_core::constants::{ATTR_STARTED_AT, ATTR_UPDATED_AT};

use crate::topics::context::TopicContext;
use crate::topics::registry::TopicHandler;

/// Topic name.
pub const TOPIC: &str = "session.info";

/// Reply body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Transport connection ID.
    pub connection_id: String,
    /// Effective client identity.
    pub client_id: String,
    /// Handshake time.
    pub started_at: Option<String>,
    /// Time the previous frame was processed.
    pub updated_at: Option<String>,
}

/// Replies on `session.info` with a [`SessionInfo`]. Any body is ignored.
pub struct SessionInfoHandler;

#[async_trait]
impl TopicHandler for SessionInfoHandler {
    type Payload = IgnoredAny;

    async fn handle(&self, ctx: &TopicContext, _payload: Option<IgnoredAny>) -> Result<(), HandlerError> {
        let conn = &ctx.connection;
        let info = SessionInfo {
            connection_id: conn.id.to_string(),
            client_id: conn.client_id().into_inner(),
            started_at: conn.attribute(ATTR_STARTED_AT),
            updated_at: conn.attribute(ATTR_UPDATED_AT),
        };
        ctx.reply(TOPIC, &info)?;
        Ok(())
    }
}
