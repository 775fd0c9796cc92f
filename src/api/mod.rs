//! Webhook and operations API.

mod routes;

pub use routes::{router, ApiState};
