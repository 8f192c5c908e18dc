//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and storage concerns so route handlers
//! can stay focused on protocol translation and auth plumbing.

pub mod auth;
pub mod credential;
pub mod session;
