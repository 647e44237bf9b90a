//! Data models for persisted records and API request/response types.

/// Registered user record and registration payloads
pub mod user;
/// JWT claims
pub mod claims;
/// Row model for the `places_reviews` import table
pub mod place_review;
