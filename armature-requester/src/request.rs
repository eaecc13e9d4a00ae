//! Request builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use http::{HeaderMap, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use url::Url;

use crate::body::{Body, ProgressFn};
use crate::codec::ResultTarget;
use crate::config::{parse_header, set_pair};
use crate::error::SendResult;
use crate::url_builder::{UrlParams, build_url};
use crate::{BoxError, Cookie, HttpClient, HttpClientError, Result, execute};

/// Per-call request descriptor.
///
/// Values set here overlay the client defaults. Setters consume and return
/// the request; terminal verbs such as [`Request::get`] and [`Request::send`]
/// run it.
#[derive(Clone)]
pub struct Request<'a> {
    pub(crate) client: &'a HttpClient,
    pub(crate) method: Option<Method>,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) path_params: BTreeMap<String, String>,
    pub(crate) form_data: Vec<(String, String)>,
    pub(crate) body: Option<Body>,
    pub(crate) basic_auth: Option<(String, String)>,
    pub(crate) bearer_token: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) deadline: Option<Instant>,
    pub(crate) success_result: Option<ResultTarget>,
    pub(crate) error_result: Option<ResultTarget>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) upload_progress: Option<ProgressFn>,
    pub(crate) span_name: Option<String>,
}

impl<'a> Request<'a> {
    pub(crate) fn new(client: &'a HttpClient) -> Self {
        Self {
            client,
            method: None,
            url: String::new(),
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            path_params: BTreeMap::new(),
            form_data: Vec::new(),
            body: None,
            basic_auth: None,
            bearer_token: None,
            user_agent: None,
            cookies: Vec::new(),
            timeout: None,
            deadline: None,
            success_result: None,
            error_result: None,
            output: None,
            upload_progress: None,
            span_name: None,
        }
    }

    /// The client this request belongs to.
    pub fn client(&self) -> &'a HttpClient {
        self.client
    }

    /// The method, if set.
    pub fn method_ref(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    /// The URL template as set, before base URL and parameters are applied.
    pub fn raw_url(&self) -> &str {
        &self.url
    }

    /// Request-level headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Set the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the URL, absolute or relative to the client base URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set a header, replacing previous request-level values.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Append a header value.
    pub fn add_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.headers.append(name, value);
        }
        self
    }

    /// Set several headers.
    pub fn headers_from<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    /// Set a query parameter, replacing previous request-level values.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_pair(&mut self.query_params, key.into(), value.into());
        self
    }

    /// Append a query parameter value.
    pub fn add_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Set several query parameters.
    pub fn query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            set_pair(&mut self.query_params, key.into(), value.into());
        }
        self
    }

    /// Replace request-level query parameters with a parsed query string.
    ///
    /// A string that does not parse leaves the parameters untouched.
    pub fn query_string(mut self, query: impl AsRef<str>) -> Self {
        let query = query.as_ref().trim_start_matches('?');
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => self.query_params = pairs,
            Err(e) => tracing::warn!(error = %e, "Ignoring unparsable query string"),
        }
        self
    }

    /// Set a path parameter substituted for `{key}` in the URL.
    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    /// Set several path parameters.
    pub fn path_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.path_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a form field, replacing previous request-level values.
    pub fn form_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_pair(&mut self.form_data, key.into(), value.into());
        self
    }

    /// Append a form field value.
    pub fn add_form_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form_data.push((key.into(), value.into()));
        self
    }

    /// Set the body as raw bytes.
    pub fn body_bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Bytes(body.into()));
        self
    }

    /// Set the body as text.
    pub fn body_string(mut self, body: impl Into<String>) -> Self {
        self.body = Some(Body::Text(body.into()));
        self
    }

    /// Stream the body from `stream`. A stream body can only be sent once,
    /// so a request carrying one makes a single attempt.
    pub fn body_stream<S, E>(mut self, stream: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.body = Some(Body::stream(stream.map(|chunk| chunk.map_err(Into::into)).boxed()));
        self
    }

    /// Set a body encoded with the client's JSON codec.
    pub fn body_json<T>(mut self, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.body = Some(Body::Json(Arc::new(value)));
        self
    }

    /// Set a body encoded with the client's XML codec.
    pub fn body_xml<T>(mut self, value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        self.body = Some(Body::Xml(Arc::new(value)));
        self
    }

    /// Set basic authentication. Skipped when `username` is empty.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    /// Set bearer authentication. Overrides basic authentication.
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Alias of [`Request::bearer_auth`].
    pub fn auth_token(self, token: impl Into<String>) -> Self {
        self.bearer_auth(token)
    }

    /// Set the user agent for this request.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add a cookie.
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Add several cookies.
    pub fn cookies(mut self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Bound the whole call, retries included, to `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bound the whole call, retries included, to an absolute deadline.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Decode successful responses into `T`, see [`crate::Response::success_result`].
    pub fn success_result<T>(mut self) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.success_result = Some(ResultTarget::of::<T>());
        self
    }

    /// Decode error responses into `T`, see [`crate::Response::error_result`].
    pub fn error_result<T>(mut self) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.error_result = Some(ResultTarget::of::<T>());
        self
    }

    /// Write the response body to a file.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Report upload progress as `(bytes_written, bytes_total)`.
    pub fn upload_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.upload_progress = Some(Arc::new(callback));
        self
    }

    /// Name of the tracing span the call runs in.
    pub fn span_name(mut self, name: impl Into<String>) -> Self {
        self.span_name = Some(name.into());
        self
    }

    /// Check that the request has a method and a URL.
    pub fn validate(&self) -> Result<()> {
        if self.method.is_none() {
            return Err(HttpClientError::Validation("HTTP method is required".to_string()));
        }
        if self.url.is_empty() {
            return Err(HttpClientError::Validation("URL is required".to_string()));
        }
        Ok(())
    }

    /// Final URL: base URL, path parameters and merged query applied.
    pub fn final_url(&self) -> Result<Url> {
        let config = self.client.config();
        build_url(
            &self.url,
            config.base_url.as_deref().unwrap_or_default(),
            UrlParams {
                path: &config.path_params,
                query: &config.query_params,
            },
            UrlParams {
                path: &self.path_params,
                query: &self.query_params,
            },
        )
    }

    pub(crate) fn has_stream_body(&self) -> bool {
        matches!(self.body, Some(Body::Stream(_)))
    }

    /// Send the request as it is configured.
    pub async fn send(self) -> SendResult {
        self.validate()?;
        execute::execute(self).await
    }

    /// Send with the given method and URL.
    pub async fn execute(self, method: Method, url: impl Into<String>) -> SendResult {
        self.method(method).url(url).send().await
    }

    /// Send a GET request.
    pub async fn get(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::GET, url).await
    }

    /// Send a POST request.
    pub async fn post(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::POST, url).await
    }

    /// Send a PUT request.
    pub async fn put(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::PUT, url).await
    }

    /// Send a PATCH request.
    pub async fn patch(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::PATCH, url).await
    }

    /// Send a DELETE request.
    pub async fn delete(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::DELETE, url).await
    }

    /// Send a HEAD request.
    pub async fn head(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::HEAD, url).await
    }

    /// Send an OPTIONS request.
    pub async fn options(self, url: impl Into<String>) -> SendResult {
        self.execute(Method::OPTIONS, url).await
    }
}

impl fmt::Display for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = self.method.as_ref().map_or("-", Method::as_str);
        match self.final_url() {
            Ok(url) => write!(f, "{method} {url}"),
            Err(_) => write!(f, "{method} {}", self.url),
        }
    }
}

impl fmt::Debug for Request<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("query_params", &self.query_params)
            .field("path_params", &self.path_params)
            .field("form_data", &self.form_data)
            .field("body", &self.body)
            .field("cookies", &self.cookies)
            .field("timeout", &self.timeout)
            .field("success_result", &self.success_result)
            .field("error_result", &self.error_result)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
