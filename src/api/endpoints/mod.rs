//! Endpoint handlers.

pub mod flows;
pub mod health;
pub mod push_tokens;
pub mod reminders;
