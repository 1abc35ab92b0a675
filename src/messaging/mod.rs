//! # Message Acquisition
//!
//! Inbound side of the dispatch pipeline: envelope and acknowledgment types,
//! the [`MessageSource`] trait the coordinator consumes, and the concrete
//! pgmq-backed adapter.
//!
//! The source hands out envelopes with at-least-once semantics: a pulled
//! message becomes invisible upstream for the visibility timeout and is
//! redelivered unless the coordinator acknowledges it.

pub mod pgmq_source;
pub mod source;

pub use pgmq_source::PgmqMessageSource;
pub use source::{AckHandle, Envelope, MessageSource};
