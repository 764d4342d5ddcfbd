//! Shared application state, built from [`crate::config::AccessManagerEnvConfig`]
//! the same way the donor's `ServiceState::from_env` assembled its store and
//! metrics handles.

use std::sync::Arc;

use crate::config::{AccessManagerEnvConfig, PersisterBackend};
use crate::core::{AccessManager, AccessManagerBuilder};
use crate::metrics::TracingMetricLogger;

/// The engine type the service exposes: every identifier is a plain
/// `String`.
pub type StringAccessManager = AccessManager<String, String, String, String>;

/// Axum application state: a shared handle to the engine.
#[derive(Clone)]
pub struct ServiceState {
    /// The underlying engine.
    pub manager: Arc<StringAccessManager>,
}

impl ServiceState {
    /// Build state from environment configuration. Falls back to the
    /// in-memory persister if `postgres` was requested but the feature is
    /// not compiled in.
    pub fn from_env() -> Self {
        let env = AccessManagerEnvConfig::from_env();
        let mut builder = AccessManagerBuilder::new()
            .throw_idempotency_exceptions(env.throw_idempotency_exceptions)
            .removal_mode(env.removal_mode);

        if env.metric_logging_enabled {
            builder = builder.metric_logger(TracingMetricLogger::new());
        }

        #[cfg(feature = "postgres")]
        if env.persister_backend == PersisterBackend::Postgres {
            match crate::persistence::PostgresPersisterConfig::from_env()
                .and_then(|cfg| crate::persistence::PostgresEventPersister::connect(&cfg))
            {
                Ok(persister) => {
                    builder = builder.persister(persister);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to connect Postgres persister, falling back to in-memory");
                }
            }
        }
        #[cfg(not(feature = "postgres"))]
        if env.persister_backend == PersisterBackend::Postgres {
            tracing::warn!("ACCESS_MANAGER_PERSISTER_BACKEND=postgres requested without the postgres feature, using in-memory");
        }

        Self { manager: Arc::new(builder.build()) }
    }
}
