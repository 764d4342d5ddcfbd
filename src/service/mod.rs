//! C10: REST adapter, enabled by the `service` feature.
//!
//! The engine is generic over four identifier types, but a wire-facing
//! service needs a concrete JSON shape; this adapter monomorphizes to
//! `AccessManager<String, String, String, String>`, the natural choice for a
//! network-facing deployment where every identifier arrives as a string.

mod middleware;
mod routes;
mod state;

pub use middleware::metrics_middleware;
pub use routes::router;
pub use state::{ServiceState, StringAccessManager};
