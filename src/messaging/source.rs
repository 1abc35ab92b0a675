//! # Message Source Contract
//!
//! The envelope types and the pull/ack trait every message source adapter
//! implements. The coordinator only ever sees this interface; the queue
//! technology behind it is an adapter concern.

use crate::error::DispatchResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Opaque token confirming one envelope, usable exactly once.
///
/// Only message sources mint and interpret handles. The type is
/// deliberately not `Clone`: acknowledgment and dead-lettering take the
/// handle by value, so a second confirmation of the same envelope does not
/// compile.
#[derive(Debug)]
pub struct AckHandle {
    msg_id: i64,
}

impl AckHandle {
    pub fn new(msg_id: i64) -> Self {
        Self { msg_id }
    }

    /// Source-side identifier behind the handle
    pub fn msg_id(&self) -> i64 {
        self.msg_id
    }
}

/// One pulled notification with its delivery metadata.
///
/// Owned exclusively by the coordinator for the duration of one pipeline
/// pass; consuming the ack handle ends its life.
#[derive(Debug)]
pub struct Envelope {
    /// Raw payload bytes as delivered by the queue
    pub payload: Vec<u8>,
    /// Confirmation token, consumed on acknowledgment
    pub ack_handle: AckHandle,
    /// How many times the queue has delivered this message, if known
    pub delivery_count: Option<i32>,
    /// When this envelope was pulled
    pub pulled_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(payload: Vec<u8>, ack_handle: AckHandle, delivery_count: Option<i32>) -> Self {
        Self {
            payload,
            ack_handle,
            delivery_count,
            pulled_at: Utc::now(),
        }
    }

    /// Short lossy excerpt of the payload for diagnostic logging
    pub fn payload_excerpt(&self) -> String {
        const EXCERPT_LEN: usize = 96;
        let text = String::from_utf8_lossy(&self.payload);
        if text.len() <= EXCERPT_LEN {
            text.into_owned()
        } else {
            let cut = text
                .char_indices()
                .take_while(|(i, _)| *i < EXCERPT_LEN)
                .last()
                .map_or(0, |(i, c)| i + c.len_utf8());
            format!("{}…", &text[..cut])
        }
    }
}

/// Pull/ack interface to the upstream notification queue.
///
/// `pull` marks returned messages as in-flight upstream, so an envelope
/// that is never acknowledged comes back after the source's visibility
/// timeout elapses (at-least-once delivery). Adapters surface connectivity
/// problems as `SourceUnavailable` without retrying internally; retry
/// policy belongs to the coordinator.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Pull up to `max_messages` pending envelopes, waiting at most `timeout`
    async fn pull(&self, max_messages: i32, timeout: Duration) -> DispatchResult<Vec<Envelope>>;

    /// Confirm an envelope as fully handled, preventing redelivery
    async fn ack(&self, handle: AckHandle) -> DispatchResult<()>;

    /// Park an envelope permanently without counting it as handled.
    ///
    /// Used for payloads that can never succeed, so the queue does not
    /// redeliver them until max-delivery-attempts runs out.
    async fn dead_letter(&self, handle: AckHandle) -> DispatchResult<()>;
}
