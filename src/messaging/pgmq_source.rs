//! # pgmq Message Source
//!
//! Concrete [`MessageSource`] over the pgmq-rs crate. A batch read with a
//! visibility timeout marks messages in-flight, `delete` acknowledges, and
//! `archive` parks dead-lettered messages out of the delivery loop while
//! keeping them queryable for diagnosis.

use crate::error::{DispatchError, DispatchResult};
use crate::messaging::source::{AckHandle, Envelope, MessageSource};
use async_trait::async_trait;
use pgmq::{types::Message, PGMQueue};
use std::time::Duration;
use tracing::{debug, info};

/// pgmq-backed message source adapter
#[derive(Debug, Clone)]
pub struct PgmqMessageSource {
    pgmq: PGMQueue,
    queue_name: String,
    visibility_timeout_secs: i32,
}

impl PgmqMessageSource {
    /// Connect to pgmq using a connection string
    pub async fn new(
        database_url: &str,
        queue_name: impl Into<String>,
        visibility_timeout_secs: i32,
    ) -> DispatchResult<Self> {
        info!("🚀 Connecting to pgmq message source");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| DispatchError::source_unavailable("connect", e.to_string()))?;

        info!("✅ Connected to pgmq message source");
        Ok(Self {
            pgmq,
            queue_name: queue_name.into(),
            visibility_timeout_secs,
        })
    }

    /// Create a source from an existing connection pool (BYOP)
    pub async fn new_with_pool(
        pool: sqlx::PgPool,
        queue_name: impl Into<String>,
        visibility_timeout_secs: i32,
    ) -> Self {
        info!("🚀 Creating pgmq message source with shared connection pool");

        let pgmq = PGMQueue::new_with_pool(pool).await;

        Self {
            pgmq,
            queue_name: queue_name.into(),
            visibility_timeout_secs,
        }
    }

    /// Create the backing queue if it doesn't exist
    pub async fn ensure_queue(&self) -> DispatchResult<()> {
        debug!("📋 Ensuring queue exists: {}", self.queue_name);

        self.pgmq
            .create(&self.queue_name)
            .await
            .map_err(|e| DispatchError::source_unavailable("create_queue", e.to_string()))?;

        info!("✅ Queue ready: {}", self.queue_name);
        Ok(())
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Raw payload bytes behind a queued message.
    ///
    /// Notification publishers enqueue the transport-encoded payload as a
    /// JSON string; anything else is passed through as its compact JSON
    /// serialization, leaving the decision to the payload decoder.
    fn payload_bytes(message: &serde_json::Value) -> Vec<u8> {
        match message {
            serde_json::Value::String(s) => s.clone().into_bytes(),
            other => other.to_string().into_bytes(),
        }
    }
}

#[async_trait]
impl MessageSource for PgmqMessageSource {
    async fn pull(&self, max_messages: i32, timeout: Duration) -> DispatchResult<Vec<Envelope>> {
        debug!(
            queue = %self.queue_name,
            max_messages,
            "📥 Pulling messages"
        );

        let read = self.pgmq.read_batch::<serde_json::Value>(
            &self.queue_name,
            Some(self.visibility_timeout_secs),
            max_messages,
        );

        // A hung connection counts as an unreachable source, not an empty pull.
        let messages: Vec<Message<serde_json::Value>> = tokio::time::timeout(timeout, read)
            .await
            .map_err(|_| {
                DispatchError::source_unavailable(
                    "pull",
                    format!("read timed out after {}ms", timeout.as_millis()),
                )
            })?
            .map_err(|e| DispatchError::source_unavailable("pull", e.to_string()))?
            .unwrap_or_default();

        debug!(
            queue = %self.queue_name,
            count = messages.len(),
            "📨 Pulled messages"
        );

        Ok(messages
            .into_iter()
            .map(|msg| {
                Envelope::new(
                    Self::payload_bytes(&msg.message),
                    AckHandle::new(msg.msg_id),
                    Some(msg.read_ct),
                )
            })
            .collect())
    }

    async fn ack(&self, handle: AckHandle) -> DispatchResult<()> {
        let msg_id = handle.msg_id();
        debug!(queue = %self.queue_name, msg_id, "🗑️ Acknowledging message");

        self.pgmq
            .delete(&self.queue_name, msg_id)
            .await
            .map_err(|e| DispatchError::source_unavailable("ack", e.to_string()))?;

        debug!(queue = %self.queue_name, msg_id, "✅ Message acknowledged");
        Ok(())
    }

    async fn dead_letter(&self, handle: AckHandle) -> DispatchResult<()> {
        let msg_id = handle.msg_id();
        debug!(queue = %self.queue_name, msg_id, "📦 Dead-lettering message");

        self.pgmq
            .archive(&self.queue_name, msg_id)
            .await
            .map_err(|e| DispatchError::source_unavailable("dead_letter", e.to_string()))?;

        info!(queue = %self.queue_name, msg_id, "📦 Message dead-lettered");
        Ok(())
    }
}
