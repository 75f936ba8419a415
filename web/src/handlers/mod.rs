//! HTTP request handlers.

pub mod health;
pub mod tickets;
pub mod verify;
