//! Before-request, after-response and error hooks.
//!
//! Hooks are registered on the client and run in registration order.
//! Closures with the matching signature implement the traits directly.

use crate::error::BoxError;
use crate::{HttpClient, HttpClientError, Request, Response};

/// Runs against the assembled wire request right before it is sent.
///
/// An error aborts the whole call: no further hooks run and no retry is
/// attempted.
pub trait BeforeRequestHook: Send + Sync {
    /// Inspect or modify the outgoing request.
    fn before_request(
        &self,
        client: &HttpClient,
        request: &mut reqwest::Request,
    ) -> std::result::Result<(), BoxError>;
}

impl<F> BeforeRequestHook for F
where
    F: Fn(&HttpClient, &mut reqwest::Request) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn before_request(
        &self,
        client: &HttpClient,
        request: &mut reqwest::Request,
    ) -> std::result::Result<(), BoxError> {
        self(client, request)
    }
}

/// Runs against each received response after classification.
///
/// An error becomes the attempt's terminal error and is handed to the retry
/// condition; later hooks are skipped for that attempt.
pub trait AfterResponseHook: Send + Sync {
    /// Inspect or modify the response.
    fn after_response(
        &self,
        client: &HttpClient,
        response: &mut Response,
    ) -> std::result::Result<(), BoxError>;
}

impl<F> AfterResponseHook for F
where
    F: Fn(&HttpClient, &mut Response) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn after_response(
        &self,
        client: &HttpClient,
        response: &mut Response,
    ) -> std::result::Result<(), BoxError> {
        self(client, response)
    }
}

/// Notified once per call when the final attempt ended with an error.
///
/// It cannot change the outcome.
pub trait ErrorHook: Send + Sync {
    /// Observe the failure.
    fn on_error(
        &self,
        client: &HttpClient,
        request: &Request<'_>,
        response: Option<&Response>,
        error: &HttpClientError,
    );
}

impl<F> ErrorHook for F
where
    F: Fn(&HttpClient, &Request<'_>, Option<&Response>, &HttpClientError) + Send + Sync,
{
    fn on_error(
        &self,
        client: &HttpClient,
        request: &Request<'_>,
        response: Option<&Response>,
        error: &HttpClientError,
    ) {
        self(client, request, response, error)
    }
}
