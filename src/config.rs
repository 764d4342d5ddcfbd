//! C9: environment-driven configuration, following the same
//! `std::env::var().ok().and_then(...).unwrap_or(default)` shape used
//! elsewhere in the donor's `PostgresConfig::from_env`/`ServiceState::from_env`
//! constructors, logging a `tracing::warn!` whenever a security- or
//! correctness-relevant setting falls back to its default because the
//! environment variable was absent or unparsable.

use std::time::Duration;

use crate::dependency_free::RemovalMode;

/// Top-level configuration for an `AccessManager` instance and its
/// surrounding service, read from environment variables.
#[derive(Debug, Clone)]
pub struct AccessManagerEnvConfig {
    /// `ACCESS_MANAGER_THROW_IDEMPOTENCY_EXCEPTIONS` (default `false`).
    pub throw_idempotency_exceptions: bool,
    /// `ACCESS_MANAGER_DEPENDENCY_FREE` (default `false`): selects
    /// [`RemovalMode::DependencyFree`] when `true`.
    pub removal_mode: RemovalMode,
    /// `ACCESS_MANAGER_METRIC_LOGGING_ENABLED` (default `true`).
    pub metric_logging_enabled: bool,
    /// `ACCESS_MANAGER_SPLIT_DRAIN_MAX_RETRIES` (default `30`).
    pub split_drain_max_retries: u32,
    /// `ACCESS_MANAGER_SPLIT_DRAIN_RETRY_INTERVAL_MS` (default `100`).
    pub split_drain_retry_interval: Duration,
    /// `ACCESS_MANAGER_SPLIT_FLUSH_MAX_RETRIES` (default `5`).
    pub split_flush_max_retries: u32,
    /// `ACCESS_MANAGER_SPLIT_FLUSH_RETRY_INTERVAL_MS` (default `250`).
    pub split_flush_retry_interval: Duration,
    /// `ACCESS_MANAGER_SHARD_COUNT` (default `1`).
    pub shard_count: usize,
    /// `ACCESS_MANAGER_PERSISTER_BACKEND`: `"memory"` (default) or
    /// `"postgres"`.
    pub persister_backend: PersisterBackend,
}

/// Which [`crate::persistence::AccessManagerEventPersister`] implementation
/// to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersisterBackend {
    /// [`crate::persistence::InMemoryEventPersister`].
    Memory,
    /// [`crate::persistence::PostgresEventPersister`] (requires the
    /// `postgres` feature and `DATABASE_URL`).
    Postgres,
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => match v.parse() {
            Ok(b) => b,
            Err(_) => {
                tracing::warn!(key, value = %v, default, "failed to parse boolean env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            tracing::warn!(key, default, "env var unset or invalid, using default");
            default
        })
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            tracing::warn!(key, default, "env var unset or invalid, using default");
            default
        })
}

impl AccessManagerEnvConfig {
    /// Read every setting from the environment, falling back to defaults and
    /// warning on each fallback via `tracing`.
    pub fn from_env() -> Self {
        let removal_mode = if env_bool("ACCESS_MANAGER_DEPENDENCY_FREE", false) {
            RemovalMode::DependencyFree
        } else {
            RemovalMode::Strict
        };
        let persister_backend = match std::env::var("ACCESS_MANAGER_PERSISTER_BACKEND") {
            Ok(v) if v.eq_ignore_ascii_case("postgres") => PersisterBackend::Postgres,
            Ok(v) if v.eq_ignore_ascii_case("memory") => PersisterBackend::Memory,
            Ok(other) => {
                tracing::warn!(value = %other, "unrecognized ACCESS_MANAGER_PERSISTER_BACKEND, defaulting to memory");
                PersisterBackend::Memory
            }
            Err(_) => PersisterBackend::Memory,
        };

        Self {
            throw_idempotency_exceptions: env_bool("ACCESS_MANAGER_THROW_IDEMPOTENCY_EXCEPTIONS", false),
            removal_mode,
            metric_logging_enabled: env_bool("ACCESS_MANAGER_METRIC_LOGGING_ENABLED", true),
            split_drain_max_retries: env_u32("ACCESS_MANAGER_SPLIT_DRAIN_MAX_RETRIES", 30),
            split_drain_retry_interval: Duration::from_millis(
                env_u32("ACCESS_MANAGER_SPLIT_DRAIN_RETRY_INTERVAL_MS", 100) as u64,
            ),
            split_flush_max_retries: env_u32("ACCESS_MANAGER_SPLIT_FLUSH_MAX_RETRIES", 5),
            split_flush_retry_interval: Duration::from_millis(
                env_u32("ACCESS_MANAGER_SPLIT_FLUSH_RETRY_INTERVAL_MS", 250) as u64,
            ),
            shard_count: env_usize("ACCESS_MANAGER_SHARD_COUNT", 1),
            persister_backend,
        }
    }
}

impl Default for AccessManagerEnvConfig {
    fn default() -> Self {
        Self {
            throw_idempotency_exceptions: false,
            removal_mode: RemovalMode::Strict,
            metric_logging_enabled: true,
            split_drain_max_retries: 30,
            split_drain_retry_interval: Duration::from_millis(100),
            split_flush_max_retries: 5,
            split_flush_retry_interval: Duration::from_millis(250),
            shard_count: 1,
            persister_backend: PersisterBackend::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_unset_environment() {
        // Exercises the fallback path directly rather than mutating process
        // environment (shared across parallel test threads).
        assert_eq!(env_bool("ACCESS_MANAGER_TEST_UNSET_FLAG_XYZ", false), false);
        assert_eq!(env_u32("ACCESS_MANAGER_TEST_UNSET_COUNT_XYZ", 7), 7);
    }
}
