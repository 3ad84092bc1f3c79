//! Auth services used by HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `auth` wraps the identity gateway and normalizes its failures; `session`
//! turns the gateway's change notifications into observable state. Route
//! handlers stay focused on protocol translation.

pub mod auth;
pub mod session;
