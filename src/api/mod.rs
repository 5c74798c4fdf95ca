//! HTTP surface.
//!
//! Routes are nested under `/api/`. The dispatch trigger is protected by an
//! optional shared secret; everything else is open to the configured origin.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
