//! # Armature Requester
//!
//! A fluent HTTP request builder on top of a configurable client: shared
//! defaults, per-request overrides, fixed-interval retries, before/after
//! hooks, and typed decoding of success and error bodies.
//!
//! ## Features
//!
//! - **Layered configuration**: client defaults for headers, query, path
//!   params, form data and cookies, overlaid by each request
//! - **Retries**: `count` additional attempts with a fixed interval and a
//!   pluggable condition
//! - **Hooks**: before-request and after-response chains plus an error hook
//! - **Typed results**: register `success_result::<T>()` / `error_result::<T>()`
//!   and read them back from the [`Response`]
//! - **Codecs**: JSON and XML, replaceable per client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use armature_requester::{HttpClient, HttpClientConfig};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct ApiError {
//!     message: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new(
//!         HttpClientConfig::builder()
//!             .base_url("https://api.example.com")
//!             .retry_count(2)
//!             .build(),
//!     );
//!
//!     let response = client
//!         .request()
//!         .path_param("id", "42")
//!         .success_result::<User>()
//!         .error_result::<ApiError>()
//!         .get("/users/{id}")
//!         .await?;
//!
//!     if let Some(user) = response.success_result::<User>() {
//!         println!("Hello, {}", user.name);
//!     } else if let Some(err) = response.error_result::<ApiError>() {
//!         println!("API error: {}", err.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Hooks
//!
//! ```rust,no_run
//! use armature_requester::HttpClient;
//!
//! let mut client = HttpClient::default();
//! client
//!     .on_before_request(|_client, request| {
//!         request.headers_mut().insert("x-request-id", "abc".parse()?);
//!         Ok(())
//!     })
//!     .on_error(|_client, request, _response, error| {
//!         tracing::warn!(%request, %error, "request failed");
//!     });
//! ```

mod body;
mod client;
mod codec;
mod config;
mod cookie;
mod error;
mod execute;
mod hooks;
mod request;
mod response;
mod retry;
mod transport;
mod url_builder;

pub use body::ProgressFn;
pub use client::HttpClient;
pub use codec::{Codec, Codecs, Format};
pub use config::{HttpClientConfig, HttpClientConfigBuilder};
pub use cookie::Cookie;
pub use error::{BoxError, HttpClientError, Result, SendError, SendResult};
pub use hooks::{AfterResponseHook, BeforeRequestHook, ErrorHook};
pub use request::Request;
pub use response::{Response, ResultClassifier, ResultState, default_classifier};
pub use retry::{DefaultRetryCondition, RetryCondition, RetryConfig};
pub use transport::{TlsConfig, Transport};

// Re-export common types
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;
pub use bytes::Bytes;

/// User agent sent when neither the request nor the client sets one.
pub const DEFAULT_USER_AGENT: &str = concat!("armature-requester/", env!("CARGO_PKG_VERSION"));

/// Prelude for common imports.
///
/// ```
/// use armature_requester::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::HttpClient;
    pub use crate::config::{HttpClientConfig, HttpClientConfigBuilder};
    pub use crate::cookie::Cookie;
    pub use crate::error::{HttpClientError, Result, SendError, SendResult};
    pub use crate::request::Request;
    pub use crate::response::{Response, ResultState};
    pub use crate::retry::RetryConfig;
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
}
