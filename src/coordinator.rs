//! # Pipeline Coordinator
//!
//! Sequences one pass over the pipeline: pull, decode, route, submit,
//! acknowledge. Each envelope moves through the states
//! `Pulled → Decoded → Routed → Submitted → Acknowledged`, with `Abandoned`
//! as the failure-terminal state: the envelope is left unacknowledged and
//! the queue redelivers it after the visibility timeout.
//!
//! Acknowledgment happens after and only after the backend accepts the
//! submission, exactly one job is submitted per envelope, and no stage is
//! retried within a pass. The single local retry in the pipeline is the
//! bounded, backed-off retry of the pull itself when the source is
//! unreachable.

use crate::catalog::JobCatalog;
use crate::config::DispatchConfig;
use crate::decoder;
use crate::error::{DispatchError, DispatchResult};
use crate::messaging::{Envelope, MessageSource};
use crate::submitter::JobSubmitter;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Coordinator tuning, derived from [`DispatchConfig`]
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub max_messages: i32,
    pub pull_timeout: Duration,
    pub submit_timeout: Duration,
    pub retry_limit: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub dead_letter_permanent_failures: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for CoordinatorConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_messages: config.max_messages,
            pull_timeout: Duration::from_millis(config.pull_timeout_ms),
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            retry_limit: config.retry_limit,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            dead_letter_permanent_failures: config.dead_letter_permanent_failures,
        }
    }
}

/// Terminal state of one envelope's pipeline pass
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Submission accepted and the envelope confirmed to the source
    Acknowledged { job_id: Option<String> },
    /// Envelope left to the source's redelivery mechanism
    Abandoned {
        error: DispatchError,
        dead_lettered: bool,
    },
}

impl DispatchOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged { .. })
    }
}

/// Coordinates the dispatch pipeline over one message source, catalog, and
/// submitter.
///
/// The catalog is immutable and every pass is self-contained, so envelopes
/// within a pass are processed concurrently without synchronization.
pub struct DispatchCoordinator {
    source: Arc<dyn MessageSource>,
    catalog: Arc<JobCatalog>,
    submitter: JobSubmitter,
    config: CoordinatorConfig,
}

impl DispatchCoordinator {
    pub fn new(
        source: Arc<dyn MessageSource>,
        catalog: Arc<JobCatalog>,
        submitter: JobSubmitter,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            source,
            catalog,
            submitter,
            config,
        }
    }

    /// Run one pipeline pass: pull a batch and drive every envelope to a
    /// terminal state. Returns the per-envelope outcomes in pull order.
    pub async fn run_once(&self) -> DispatchResult<Vec<DispatchOutcome>> {
        let envelopes = self.pull_with_retry().await?;

        if envelopes.is_empty() {
            debug!("No pending envelopes");
            return Ok(Vec::new());
        }

        debug!(count = envelopes.len(), "Processing pulled envelopes");

        let outcomes = join_all(
            envelopes
                .into_iter()
                .map(|envelope| self.process_envelope(envelope)),
        )
        .await;

        let acknowledged = outcomes.iter().filter(|o| o.is_acknowledged()).count();
        info!(
            total = outcomes.len(),
            acknowledged,
            abandoned = outcomes.len() - acknowledged,
            "Pipeline pass complete"
        );

        Ok(outcomes)
    }

    /// Pull with bounded retry. Only `SourceUnavailable` is retried; the
    /// delay doubles from the base up to the cap.
    async fn pull_with_retry(&self) -> DispatchResult<Vec<Envelope>> {
        let mut attempt: u32 = 0;

        loop {
            match self
                .source
                .pull(self.config.max_messages, self.config.pull_timeout)
                .await
            {
                Ok(envelopes) => return Ok(envelopes),
                Err(e @ DispatchError::SourceUnavailable { .. }) if attempt < self.config.retry_limit => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        retry_limit = self.config.retry_limit,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Pull failed, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, "Pull failed, surfacing as fatal run error");
                    return Err(e);
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.config
            .backoff_base
            .saturating_mul(factor)
            .min(self.config.backoff_max)
    }

    /// Drive one envelope to a terminal state.
    async fn process_envelope(&self, envelope: Envelope) -> DispatchOutcome {
        let msg_id = envelope.ack_handle.msg_id();

        // Pulled → Decoded
        let request = match decoder::decode(&envelope.payload) {
            Ok(request) => request,
            Err(e) => return self.abandon(envelope, e).await,
        };

        // Decoded → Routed
        let descriptor = match self.catalog.route(&request) {
            Ok(descriptor) => descriptor,
            Err(e) => return self.abandon(envelope, e).await,
        };

        debug!(
            msg_id,
            routing_key = %request.routing_key(),
            target = %descriptor.target,
            "Envelope routed"
        );

        // Routed → Submitted, bounded by the submit deadline
        let submission = self.submitter.submit(descriptor, request.params());
        let result = match tokio::time::timeout(self.config.submit_timeout, submission).await {
            Ok(result) => result,
            Err(_) => {
                let e = DispatchError::submission_failure(format!(
                    "submission timed out after {}ms",
                    self.config.submit_timeout.as_millis()
                ));
                return self.abandon(envelope, e).await;
            }
        };

        if !result.accepted {
            let detail = result
                .error
                .unwrap_or_else(|| "backend rejected submission".to_string());
            return self
                .abandon(envelope, DispatchError::submission_failure(detail))
                .await;
        }

        // Submitted → Acknowledged, only now that the backend accepted
        match self.source.ack(envelope.ack_handle).await {
            Ok(()) => {
                info!(msg_id, job_id = ?result.job_id, "Envelope acknowledged");
                DispatchOutcome::Acknowledged {
                    job_id: result.job_id,
                }
            }
            Err(e) => {
                // The job was submitted; redelivery will re-run it, which the
                // at-least-once contract already requires downstream to absorb.
                warn!(
                    msg_id,
                    job_id = ?result.job_id,
                    error = %e,
                    "Submission accepted but acknowledgment failed; envelope stays pending"
                );
                DispatchOutcome::Abandoned {
                    error: e,
                    dead_lettered: false,
                }
            }
        }
    }

    /// Failure-terminal transition. The envelope is never acknowledged;
    /// permanently malformed payloads are parked when dead-lettering is
    /// enabled so the queue stops re-presenting them.
    async fn abandon(&self, envelope: Envelope, error: DispatchError) -> DispatchOutcome {
        let msg_id = envelope.ack_handle.msg_id();

        error!(
            msg_id,
            delivery_count = envelope.delivery_count,
            payload_excerpt = %envelope.payload_excerpt(),
            error = %error,
            permanent = error.is_permanent(),
            "Envelope abandoned"
        );

        let mut dead_lettered = false;
        if error.is_permanent() && self.config.dead_letter_permanent_failures {
            match self.source.dead_letter(envelope.ack_handle).await {
                Ok(()) => dead_lettered = true,
                Err(e) => {
                    warn!(msg_id, error = %e, "Dead-lettering failed; leaving envelope for redelivery");
                }
            }
        }

        DispatchOutcome::Abandoned {
            error,
            dead_lettered,
        }
    }
}
