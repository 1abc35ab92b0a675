#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Sprocket Core
//!
//! Message-driven dispatch core: pulls notifications from a queue, decodes
//! each payload, routes it onto exactly one entry in a static job catalog,
//! submits the corresponding stored-procedure invocation to a warehouse
//! query backend, and acknowledges the notification only once the backend
//! has accepted the submission.
//!
//! ## Pipeline
//!
//! ```text
//! pull ──▶ decode ──▶ route ──▶ submit ──▶ acknowledge
//!   │         │          │         │
//!   └─────────┴──────────┴─────────┴──▶ abandon (queue redelivers)
//! ```
//!
//! Delivery is at-least-once: an envelope that fails at any stage is left
//! unacknowledged and comes back after the queue's visibility timeout.
//! Exactly one job is submitted per envelope and nothing is retried within
//! a pass; redelivery is the retry mechanism.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Envelope types, the message source trait, pgmq adapter
//! - [`decoder`] - Payload transport decoding and routing-key extraction
//! - [`catalog`] - Static job catalog and the routing lookup
//! - [`submitter`] - Invocation rendering and the query backend seam
//! - [`coordinator`] - Per-envelope state machine and acknowledgment policy
//! - [`config`] - Environment-driven runtime configuration
//! - [`error`] - Structured failure taxonomy
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sprocket_core::catalog::stock_catalog;
//! use sprocket_core::config::DispatchConfig;
//! use sprocket_core::coordinator::{CoordinatorConfig, DispatchCoordinator};
//! use sprocket_core::messaging::PgmqMessageSource;
//! use sprocket_core::submitter::{JobSubmitter, PgQueryBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DispatchConfig::from_env()?;
//! let pool = sqlx::PgPool::connect(&config.database_url).await?;
//!
//! let source = Arc::new(
//!     PgmqMessageSource::new_with_pool(
//!         pool.clone(),
//!         config.queue_name.clone(),
//!         config.visibility_timeout_secs,
//!     )
//!     .await,
//! );
//! let catalog = Arc::new(stock_catalog(&config.project_id)?);
//! let submitter = JobSubmitter::new(Arc::new(PgQueryBackend::new(pool)));
//!
//! let coordinator =
//!     DispatchCoordinator::new(source, catalog, submitter, CoordinatorConfig::from(&config));
//! let outcomes = coordinator.run_once().await?;
//! println!("{} envelopes processed", outcomes.len());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod submitter;

pub use catalog::{JobCatalog, JobDescriptor};
pub use config::DispatchConfig;
pub use coordinator::{CoordinatorConfig, DispatchCoordinator, DispatchOutcome};
pub use decoder::{decode, RoutingRequest, ROUTING_KEY_FIELD};
pub use error::{DispatchError, DispatchResult};
pub use messaging::{AckHandle, Envelope, MessageSource, PgmqMessageSource};
pub use submitter::{
    JobSubmitter, PgQueryBackend, QueryBackend, QueryRequest, QuerySubmission, SubmissionResult,
};
