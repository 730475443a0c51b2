//! API client module for the file-management console.
//!
//! Provides the authenticated HTTP client with token refresh, credential
//! storage, and one module of request helpers per backend resource.

pub mod account;
pub mod auth;
pub mod client;
pub mod dashboard;
pub mod error;
pub mod files;
pub mod profile;
pub mod session;
pub mod types;


pub use client::{ApiClient, ApiRequest, RequestBody, Transport};
pub use error::{ApiError, FieldErrors};
pub use session::{CredentialPair, Session, SessionStatus};
