//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, headers, URL params, multipart)
//! 2. Delegates to the credential store, token issuer or upload pipeline
//! 3. Returns HTTP response (JSON or file bytes, status code)

/// Credential file downloads
pub mod downloads;
/// Service health
pub mod health;
/// CSV upload and import
pub mod uploads;
/// User registration
pub mod users;
/// API key and token verification
pub mod verification;
