//! API middleware.

pub mod trigger_auth;
