//! Shared test doubles for pipeline integration tests: an in-memory message
//! source with scriptable failures and a scripted query backend that records
//! every submission it receives.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sprocket_core::error::{DispatchError, DispatchResult};
use sprocket_core::messaging::{AckHandle, Envelope, MessageSource};
use sprocket_core::submitter::{QueryBackend, QueryRequest, QuerySubmission};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Base64-encode a JSON payload the way notification publishers do
pub fn encode_payload(value: &serde_json::Value) -> Vec<u8> {
    BASE64.encode(value.to_string()).into_bytes()
}

struct QueuedMessage {
    msg_id: i64,
    payload: Vec<u8>,
    delivery_count: i32,
}

/// In-memory [`MessageSource`] with scriptable pull and ack failures.
#[derive(Default)]
pub struct InMemoryMessageSource {
    pending: Mutex<VecDeque<QueuedMessage>>,
    acked: Mutex<Vec<i64>>,
    dead_lettered: Mutex<Vec<i64>>,
    next_id: AtomicI64,
    pull_attempts: AtomicU32,
    pull_failures_remaining: AtomicU32,
    ack_failures_remaining: AtomicU32,
}

impl InMemoryMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a JSON payload, transport-encoded as on the wire
    pub fn enqueue(&self, value: &serde_json::Value) -> i64 {
        self.enqueue_raw(encode_payload(value))
    }

    /// Enqueue raw bytes, bypassing transport encoding
    pub fn enqueue_raw(&self, payload: Vec<u8>) -> i64 {
        let msg_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.lock().unwrap().push_back(QueuedMessage {
            msg_id,
            payload,
            delivery_count: 0,
        });
        msg_id
    }

    /// Fail the next `count` pulls with `SourceUnavailable`
    pub fn fail_next_pulls(&self, count: u32) {
        self.pull_failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` acks with `SourceUnavailable`
    pub fn fail_next_acks(&self, count: u32) {
        self.ack_failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn pull_attempts(&self) -> u32 {
        self.pull_attempts.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> Vec<i64> {
        self.acked.lock().unwrap().clone()
    }

    pub fn dead_lettered(&self) -> Vec<i64> {
        self.dead_lettered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSource for InMemoryMessageSource {
    async fn pull(&self, max_messages: i32, _timeout: Duration) -> DispatchResult<Vec<Envelope>> {
        self.pull_attempts.fetch_add(1, Ordering::SeqCst);

        let failures = self.pull_failures_remaining.load(Ordering::SeqCst);
        if failures > 0 {
            self.pull_failures_remaining
                .store(failures - 1, Ordering::SeqCst);
            return Err(DispatchError::source_unavailable(
                "pull",
                "scripted outage",
            ));
        }

        let mut pending = self.pending.lock().unwrap();
        let count = (max_messages as usize).min(pending.len());
        Ok(pending
            .drain(..count)
            .map(|mut msg| {
                msg.delivery_count += 1;
                Envelope::new(
                    msg.payload,
                    AckHandle::new(msg.msg_id),
                    Some(msg.delivery_count),
                )
            })
            .collect())
    }

    async fn ack(&self, handle: AckHandle) -> DispatchResult<()> {
        let failures = self.ack_failures_remaining.load(Ordering::SeqCst);
        if failures > 0 {
            self.ack_failures_remaining
                .store(failures - 1, Ordering::SeqCst);
            return Err(DispatchError::source_unavailable("ack", "scripted outage"));
        }

        self.acked.lock().unwrap().push(handle.msg_id());
        Ok(())
    }

    async fn dead_letter(&self, handle: AckHandle) -> DispatchResult<()> {
        self.dead_lettered.lock().unwrap().push(handle.msg_id());
        Ok(())
    }
}

/// What the scripted backend does with the next submissions
#[derive(Debug, Clone)]
pub enum BackendBehavior {
    Accept,
    Reject(String),
    Stall(Duration),
}

/// [`QueryBackend`] double that records every request it receives.
pub struct ScriptedBackend {
    behavior: Mutex<BackendBehavior>,
    requests: Mutex<Vec<QueryRequest>>,
    submissions: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(behavior: BackendBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            requests: Mutex::new(Vec::new()),
            submissions: AtomicU32::new(0),
        }
    }

    pub fn accepting() -> Self {
        Self::new(BackendBehavior::Accept)
    }

    pub fn set_behavior(&self, behavior: BackendBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn submit_query(&self, request: QueryRequest) -> DispatchResult<QuerySubmission> {
        self.requests.lock().unwrap().push(request);
        let behavior = self.behavior.lock().unwrap().clone();

        match behavior {
            BackendBehavior::Accept => {
                let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(QuerySubmission {
                    job_id: format!("job-{n}"),
                })
            }
            BackendBehavior::Reject(error) => Err(DispatchError::submission_failure(error)),
            BackendBehavior::Stall(duration) => {
                tokio::time::sleep(duration).await;
                let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(QuerySubmission {
                    job_id: format!("job-{n}"),
                })
            }
        }
    }
}
