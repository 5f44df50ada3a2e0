//! HTTP transport for indexkeeper
//!
//! Provides a mockable, configurable JSON client for a cluster's management API.
//!
//! ## Features
//!
//! - **Trait-based design**: Mockable via `HttpClientTrait`
//! - **Configurable**: Base URL, timeouts, retries, proxy, user-agent
//! - **Retries**: exponential backoff for read-only calls; mutating calls are sent once
//! - **Testing support**: Easy mocking with wiremock

pub mod client;
pub mod config;
pub mod error;
pub mod retry;

pub use client::{shared_client, HttpClient, HttpClientTrait};
pub use config::HttpConfig;
pub use error::{HttpError, Result};
pub use retry::RetryPolicy;

/// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
