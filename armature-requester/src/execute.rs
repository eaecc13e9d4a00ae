//! Execution engine: prepare, send, classify, decode and retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use http::HeaderValue;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, USER_AGENT};
use tokio::time::Instant;
use tracing::{Instrument, debug, warn};

use crate::body::{FormData, encode_body};
use crate::codec::Format;
use crate::error::SendResult;
use crate::response::ResultState;
use crate::transport::Transport;
use crate::{Cookie, DEFAULT_USER_AGENT, HttpClientError, Request, Response, Result, SendError};

/// Bodies longer than this are truncated in debug logs.
const DEBUG_BODY_LIMIT: usize = 300;

/// Absolute bound on a whole call, retries included.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// The earlier of the request's timeout and its absolute deadline.
    fn for_request(request: &Request<'_>) -> Option<Self> {
        let now = Instant::now();
        let from_timeout = request.timeout.map(|budget| Self {
            at: now + budget,
            budget,
        });
        let from_deadline = request.deadline.map(|at| Self {
            at,
            budget: at.saturating_duration_since(now),
        });

        match (from_timeout, from_deadline) {
            (Some(a), Some(b)) => Some(if a.at <= b.at { a } else { b }),
            (a, b) => a.or(b),
        }
    }
}

async fn with_deadline<T>(deadline: Option<Deadline>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline.at, fut)
            .await
            .map_err(|_| HttpClientError::Timeout(deadline.budget))?,
        None => fut.await,
    }
}

/// Result of one attempt.
enum Outcome {
    Done(Response),
    Failed(HttpClientError, Option<Response>),
}

impl Outcome {
    fn response(&self) -> Option<&Response> {
        match self {
            Self::Done(response) | Self::Failed(_, Some(response)) => Some(response),
            Self::Failed(_, None) => None,
        }
    }

    fn error(&self) -> Option<&HttpClientError> {
        match self {
            Self::Done(_) => None,
            Self::Failed(error, _) => Some(error),
        }
    }
}

/// Run a validated request through every attempt and return the last outcome.
pub(crate) async fn execute(request: Request<'_>) -> SendResult {
    let span = tracing::info_span!(
        "http_request",
        name = request.span_name.as_deref().unwrap_or("http_request"),
        method = %request.method.as_ref().map_or("-", |m| m.as_str()),
        url = %request.url,
    );
    run(&request).instrument(span).await
}

async fn run(request: &Request<'_>) -> SendResult {
    let client = request.client;
    let config = client.config();
    let deadline = Deadline::for_request(request);

    let transport = match client.transport() {
        Ok(transport) => transport,
        Err(e) => return finalize(request, Outcome::Failed(e, None)),
    };

    let max_attempts = if request.has_stream_body() {
        1
    } else {
        config.retry.max_attempts()
    };

    let mut attempt = 0;
    loop {
        attempt += 1;

        let mut wire = prepare(request)?;

        if config.debug {
            log_request(&wire, attempt, max_attempts);
        } else {
            debug!(attempt, max_attempts, method = %wire.method(), url = %wire.url(), "Sending request");
        }

        for hook in &config.before_request {
            if let Err(e) = hook.before_request(client, &mut wire) {
                warn!(error = %e, "Before request hook failed");
                return Err(HttpClientError::BeforeHook(e).into());
            }
        }

        let outcome = attempt_once(request, &transport, wire, deadline).await;

        if config.debug
            && let Some(response) = outcome.response()
        {
            log_response(response);
        }

        if attempt >= max_attempts || !config.retry.should_retry(outcome.response(), outcome.error()) {
            return finalize(request, outcome);
        }

        let interval = config.retry.interval;
        if let Some(deadline) = deadline
            && Instant::now() + interval >= deadline.at
        {
            debug!(attempt, "Deadline reached, not retrying");
            return finalize(request, outcome);
        }

        debug!(
            attempt,
            delay_ms = interval.as_millis() as u64,
            error = ?outcome.error(),
            status = ?outcome.response().map(Response::status),
            "Retrying request"
        );
        tokio::time::sleep(interval).await;
    }
}

/// Assemble the wire request for one attempt.
fn prepare(request: &Request<'_>) -> Result<reqwest::Request> {
    let config = request.client.config();
    let method = request
        .method
        .clone()
        .ok_or_else(|| HttpClientError::Validation("HTTP method is required".to_string()))?;
    let url = request.final_url()?;

    let encoded = encode_body(
        request.body.as_ref(),
        FormData {
            client: &config.form_data,
            request: &request.form_data,
        },
        &config.codecs,
    )?;

    let stored = request.client.stored_cookies(&url);
    let mut wire = reqwest::Request::new(method, url);
    let headers = wire.headers_mut();

    for (name, value) in config.headers.iter().chain(request.headers.iter()) {
        headers.append(name.clone(), value.clone());
    }

    if !headers.contains_key(USER_AGENT) {
        let user_agent = request
            .user_agent
            .as_deref()
            .or(config.user_agent.as_deref())
            .unwrap_or(DEFAULT_USER_AGENT);
        headers.insert(USER_AGENT, header_value(user_agent)?);
    }

    if let Some(content_type) = encoded.content_type
        && !headers.contains_key(CONTENT_TYPE)
    {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }

    if let Some((username, password)) = &request.basic_auth
        && !username.is_empty()
    {
        let credentials = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        headers.insert(AUTHORIZATION, header_value(&format!("Basic {credentials}"))?);
    }

    if let Some(token) = &request.bearer_token
        && !token.is_empty()
    {
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
    }

    // reqwest skips the jar once a Cookie header exists, so stored cookies
    // go in first, then client cookies, then request cookies.
    let explicit = Cookie::header_value(config.cookies.iter().chain(request.cookies.iter()));
    if explicit.is_some() {
        let existing = headers.get(COOKIE).and_then(|v| v.to_str().ok()).map(str::to_string);
        let value = [existing, stored, explicit]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(COOKIE, header_value(&value)?);
    }

    let progress = request.upload_progress.as_ref();
    if progress.is_some()
        && let Some(len) = encoded.len()
        && len > 0
    {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }

    *wire.body_mut() = encoded.into_reqwest(progress);
    Ok(wire)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| HttpClientError::Validation(format!("invalid header value: {e}")))
}

/// Send, read, classify, run after-hooks and decode.
async fn attempt_once(
    request: &Request<'_>,
    transport: &Arc<dyn Transport>,
    wire: reqwest::Request,
    deadline: Option<Deadline>,
) -> Outcome {
    let client = request.client;
    let config = client.config();
    let method = wire.method().clone();
    let started = std::time::Instant::now();

    let reply = match with_deadline(deadline, transport.send(wire)).await {
        Ok(reply) => reply,
        Err(e) => {
            debug!(error = %e, "Transport error");
            return Outcome::Failed(e, None);
        }
    };

    let status = reply.status();
    let version = reply.version();
    let url = reply.url().clone();
    let headers = reply.headers().clone();

    let body = with_deadline(deadline, async {
        reply
            .bytes()
            .await
            .map_err(|e| HttpClientError::BodyRead(e.to_string()))
    })
    .await;

    let body = match body {
        Ok(body) => body,
        Err(e) => {
            let response = Response::new(method, url, status, version, headers, Default::default(), started.elapsed());
            return Outcome::Failed(e, Some(response));
        }
    };

    let mut response = Response::new(method, url, status, version, headers, body, started.elapsed());
    let state = config.classifier.classify(&response);
    response.set_state(state);

    if let Some(path) = &request.output
        && let Err(e) = tokio::fs::write(path, response.bytes()).await
    {
        warn!(path = %path.display(), error = %e, "Failed to write response body");
        return Outcome::Failed(e.into(), Some(response));
    }

    for hook in &config.after_response {
        if let Err(e) = hook.after_response(client, &mut response) {
            warn!(error = %e, "After response hook failed");
            return Outcome::Failed(HttpClientError::AfterHook(e), Some(response));
        }
    }

    match decode_results(request, &mut response) {
        Ok(()) => Outcome::Done(response),
        Err(e) => Outcome::Failed(e, Some(response)),
    }
}

/// Decode the body into the registered result type for its state.
///
/// Only a success decode failure is reported; error bodies are best effort.
fn decode_results(request: &Request<'_>, response: &mut Response) -> Result<()> {
    if response.bytes().is_empty() {
        return Ok(());
    }

    let config = request.client.config();
    let format = Format::sniff(response.content_type().unwrap_or_default());

    match response.state() {
        ResultState::Success => {
            if let Some(target) = request.success_result {
                let value = target.decode(&config.codecs, format, response.bytes())?;
                response.set_success_result(value);
            }
        }
        ResultState::Error => {
            if let Some(target) = request.error_result.or(config.common_error_result) {
                match target.decode(&config.codecs, format, response.bytes()) {
                    Ok(value) => response.set_error_result(value),
                    Err(e) => debug!(error = %e, target = ?target, "Ignoring undecodable error body"),
                }
            }
        }
        ResultState::Unknown => {}
    }

    Ok(())
}

/// Notify the error hook and turn the last outcome into the call result.
fn finalize(request: &Request<'_>, outcome: Outcome) -> SendResult {
    match outcome {
        Outcome::Done(response) => Ok(response),
        Outcome::Failed(error, response) => {
            if let Some(hook) = &request.client.config().on_error {
                hook.on_error(request.client, request, response.as_ref(), &error);
            }
            Err(SendError::new(error, response))
        }
    }
}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= DEBUG_BODY_LIMIT {
        return text.into_owned();
    }
    let mut truncated: String = text.chars().take(DEBUG_BODY_LIMIT).collect();
    truncated.push_str("...(truncated)");
    truncated
}

fn log_request(wire: &reqwest::Request, attempt: u32, max_attempts: u32) {
    let body = wire
        .body()
        .and_then(|body| body.as_bytes())
        .map(preview)
        .unwrap_or_default();
    debug!(
        attempt,
        max_attempts,
        method = %wire.method(),
        url = %wire.url(),
        headers = ?wire.headers(),
        body = %body,
        "Sending request"
    );
}

fn log_response(response: &Response) {
    debug!(
        status = %response.status_line(),
        proto = %response.proto(),
        duration_ms = response.duration().as_millis() as u64,
        headers = ?response.headers(),
        body = %preview(response.bytes()),
        "Received response"
    );
}
