//! Request handlers.

pub mod admin;
pub mod ai_tools;
pub mod auth;
pub mod credits;
pub mod generation;
pub mod health;
pub mod payment;

pub use health::{health, ready, root};
