//! POSTEASE client SDK
//!
//! Fetches resources from the POSTEASE content API, sends mail through it,
//! and keeps an on-disk cache of GET responses that the server invalidates
//! with a version token.

pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;

pub use client::PostEaseClient;
pub use config::ClientConfig;
pub use error::{ClientError, ErrorResponse};
