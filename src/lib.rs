//! File-management console client.
//!
//! [`api`] holds the authenticated HTTP client and the per-resource request
//! helpers; [`config`] resolves where the backend lives and where tokens are kept.

pub mod api;
pub mod config;
