//! # Job Submitter
//!
//! Builds the downstream invocation for a routed job descriptor and issues
//! it to the query execution backend. Submission is acceptance only; the
//! submitter never polls for job completion. All submission failures look
//! the same to the coordinator and differ only in their error detail.

use crate::catalog::JobDescriptor;
use crate::error::{DispatchError, DispatchResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One query submission handed to the execution backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryRequest {
    pub query: String,
    pub use_legacy_dialect: bool,
}

/// Backend acceptance of a submitted query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySubmission {
    pub job_id: String,
}

/// Outcome of one submission attempt, consumed by the coordinator to decide
/// acknowledgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub accepted: bool,
    pub job_id: Option<String>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionResult {
    pub fn accepted(job_id: impl Into<String>) -> Self {
        Self {
            accepted: true,
            job_id: Some(job_id.into()),
            error: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            accepted: false,
            job_id: None,
            error: Some(error.into()),
            submitted_at: Utc::now(),
        }
    }
}

/// Query execution service the submitter talks to.
///
/// The backend executes or schedules the query; it is an external
/// collaborator and the only long-blocking call in the pipeline.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn submit_query(&self, request: QueryRequest) -> DispatchResult<QuerySubmission>;
}

/// Submits routed jobs by rendering their invocation and handing it to the
/// query backend.
#[derive(Clone)]
pub struct JobSubmitter {
    backend: Arc<dyn QueryBackend>,
}

impl JobSubmitter {
    pub fn new(backend: Arc<dyn QueryBackend>) -> Self {
        Self { backend }
    }

    /// Submit one job. Render failures and backend errors both come back as
    /// a rejected [`SubmissionResult`] carrying the error detail.
    pub async fn submit(
        &self,
        descriptor: &JobDescriptor,
        params: &Map<String, Value>,
    ) -> SubmissionResult {
        let query = match render_invocation(descriptor, params) {
            Ok(query) => query,
            Err(e) => {
                warn!(
                    routing_key = %descriptor.routing_key,
                    error = %e,
                    "Invocation rendering failed"
                );
                return SubmissionResult::rejected(e.to_string());
            }
        };

        debug!(
            routing_key = %descriptor.routing_key,
            query = %query,
            "📤 Submitting job invocation"
        );

        let request = QueryRequest {
            query,
            use_legacy_dialect: descriptor.use_legacy_dialect,
        };

        match self.backend.submit_query(request).await {
            Ok(submission) => {
                info!(
                    routing_key = %descriptor.routing_key,
                    job_id = %submission.job_id,
                    "✅ Job submission accepted"
                );
                SubmissionResult::accepted(submission.job_id)
            }
            Err(e) => SubmissionResult::rejected(e.to_string()),
        }
    }
}

/// Render a descriptor's invocation template.
///
/// `{target}` expands to the fully-qualified target identifier; any other
/// `{name}` placeholder expands to the SQL literal for the request parameter
/// of that name. A placeholder with no matching parameter is a submission
/// failure, not a silently empty substitution.
pub fn render_invocation(
    descriptor: &JobDescriptor,
    params: &Map<String, Value>,
) -> DispatchResult<String> {
    let template = &descriptor.invocation_template;
    let mut rendered = String::with_capacity(template.len() + descriptor.target.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '{' {
            rendered.push(c);
            continue;
        }

        let mut name = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => {
                    return Err(DispatchError::submission_failure(format!(
                        "unterminated placeholder in invocation template: {template}"
                    )))
                }
            }
        }

        if name == "target" {
            rendered.push_str(&descriptor.target);
        } else if let Some(value) = params.get(&name) {
            rendered.push_str(&sql_literal(value));
        } else {
            return Err(DispatchError::submission_failure(format!(
                "no parameter for placeholder '{{{name}}}' in invocation template"
            )));
        }
    }

    Ok(rendered)
}

/// SQL literal for a JSON parameter value. Strings are quoted with doubled
/// quotes; structured values are passed as their JSON text.
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        structured => format!("'{}'", structured.to_string().replace('\'', "''")),
    }
}

/// Query backend over a PostgreSQL warehouse via sqlx.
///
/// Executes the rendered statement on the pool and mints a submission job
/// id on acceptance. The backend has a single SQL dialect; descriptors
/// requesting the legacy dialect are rejected rather than silently
/// reinterpreted.
#[derive(Debug, Clone)]
pub struct PgQueryBackend {
    pool: PgPool,
}

impl PgQueryBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryBackend for PgQueryBackend {
    async fn submit_query(&self, request: QueryRequest) -> DispatchResult<QuerySubmission> {
        if request.use_legacy_dialect {
            return Err(DispatchError::submission_failure(
                "legacy SQL dialect is not supported by this backend",
            ));
        }

        sqlx::query(&request.query).execute(&self.pool).await?;

        Ok(QuerySubmission {
            job_id: Uuid::new_v4().to_string(),
        })
    }
}
