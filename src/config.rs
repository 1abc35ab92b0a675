use crate::error::{DispatchError, DispatchResult};

/// Runtime configuration for the dispatch pipeline.
///
/// Every field can be overridden from the environment with a `SPROCKET_`
/// prefixed variable; unset variables fall back to the defaults below.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Project identifier used to qualify stored procedure targets
    pub project_id: String,
    /// Queue the dispatcher pulls notifications from
    pub queue_name: String,
    /// Connection string for the queue and query backend
    pub database_url: String,
    /// Maximum envelopes pulled in one pass
    pub max_messages: i32,
    /// Upper bound on one pull call
    pub pull_timeout_ms: u64,
    /// How long a pulled message stays invisible before redelivery
    pub visibility_timeout_secs: i32,
    /// Deadline for one job submission call
    pub submit_timeout_ms: u64,
    /// Bounded retries when the source is unreachable at pull time
    pub retry_limit: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Park permanently malformed envelopes instead of letting the queue
    /// redeliver them forever
    pub dead_letter_permanent_failures: bool,
    /// Idle delay between passes in the service loop
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            project_id: "sprocket-dev".to_string(),
            queue_name: "sp_trigger".to_string(),
            database_url: "postgresql://localhost/sprocket_development".to_string(),
            max_messages: 5,
            pull_timeout_ms: 5000,
            visibility_timeout_secs: 60,
            submit_timeout_ms: 30000,
            retry_limit: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 60000,
            dead_letter_permanent_failures: false,
            poll_interval_ms: 1000,
        }
    }
}

impl DispatchConfig {
    pub fn from_env() -> DispatchResult<Self> {
        let mut config = Self::default();

        if let Ok(project_id) = std::env::var("SPROCKET_PROJECT_ID") {
            config.project_id = project_id;
        }

        if let Ok(queue_name) = std::env::var("SPROCKET_QUEUE_NAME") {
            config.queue_name = queue_name;
        }

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(max_messages) = std::env::var("SPROCKET_MAX_MESSAGES") {
            config.max_messages = max_messages.parse().map_err(|e| {
                DispatchError::configuration("config", format!("Invalid max_messages: {e}"))
            })?;
        }

        if let Ok(pull_timeout) = std::env::var("SPROCKET_PULL_TIMEOUT_MS") {
            config.pull_timeout_ms = pull_timeout.parse().map_err(|e| {
                DispatchError::configuration("config", format!("Invalid pull_timeout_ms: {e}"))
            })?;
        }

        if let Ok(visibility) = std::env::var("SPROCKET_VISIBILITY_TIMEOUT_SECS") {
            config.visibility_timeout_secs = visibility.parse().map_err(|e| {
                DispatchError::configuration(
                    "config",
                    format!("Invalid visibility_timeout_secs: {e}"),
                )
            })?;
        }

        if let Ok(submit_timeout) = std::env::var("SPROCKET_SUBMIT_TIMEOUT_MS") {
            config.submit_timeout_ms = submit_timeout.parse().map_err(|e| {
                DispatchError::configuration("config", format!("Invalid submit_timeout_ms: {e}"))
            })?;
        }

        if let Ok(retry_limit) = std::env::var("SPROCKET_RETRY_LIMIT") {
            config.retry_limit = retry_limit.parse().map_err(|e| {
                DispatchError::configuration("config", format!("Invalid retry_limit: {e}"))
            })?;
        }

        if let Ok(dead_letter) = std::env::var("SPROCKET_DEAD_LETTER") {
            config.dead_letter_permanent_failures = dead_letter.parse().map_err(|e| {
                DispatchError::configuration("config", format!("Invalid dead_letter flag: {e}"))
            })?;
        }

        if let Ok(poll_interval) = std::env::var("SPROCKET_POLL_INTERVAL_MS") {
            config.poll_interval_ms = poll_interval.parse().map_err(|e| {
                DispatchError::configuration("config", format!("Invalid poll_interval_ms: {e}"))
            })?;
        }

        Ok(config)
    }
}
