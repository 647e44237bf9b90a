//! Business logic services.
//!
//! Services contain the credential and import logic separated from HTTP
//! handlers, so the same code backs the server and the batch binary.

pub mod credential_files;
pub mod credential_store;
pub mod csv_converter;
pub mod env_file;
pub mod sql_importer;
pub mod token_issuer;
pub mod upload_pipeline;
