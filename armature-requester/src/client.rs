//! HTTP client implementation.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use http::Method;
use reqwest::cookie::{CookieStore, Jar};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::codec::{Codec, Format, ResultTarget};
use crate::config::parse_header;
use crate::transport::{self, Transport};
use crate::{
    BoxError, Cookie, HttpClientConfig, HttpClientError, Request, Response, ResultState, Result,
};

/// HTTP client holding the defaults shared by its requests.
///
/// Setters take `&mut self`, and every [`Request`] borrows the client, so a
/// client cannot be reconfigured while one of its requests is alive. Clone
/// the client to hand a differently configured copy to another caller.
pub struct HttpClient {
    config: HttpClientConfig,
    jar: Arc<Jar>,
    default_transport: OnceLock<Arc<dyn Transport>>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            config,
            jar: Arc::new(Jar::default()),
            default_transport: OnceLock::new(),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Transport used for requests: the custom one if installed, otherwise
    /// the reqwest client built from this configuration.
    pub(crate) fn transport(&self) -> Result<Arc<dyn Transport>> {
        if let Some(custom) = &self.config.transport {
            return Ok(custom.clone());
        }
        if let Some(built) = self.default_transport.get() {
            return Ok(built.clone());
        }

        let built: Arc<dyn Transport> = Arc::new(transport::build_default(&self.config, self.jar.clone())?);
        debug!("Built default transport");
        Ok(self.default_transport.get_or_init(|| built).clone())
    }

    /// Cookies the server has set that apply to `url`, joined for a `Cookie` header.
    pub(crate) fn stored_cookies(&self, url: &Url) -> Option<String> {
        self.jar.cookies(url)?.to_str().ok().map(str::to_string)
    }

    #[cfg(test)]
    pub(crate) fn store_cookies(&self, set_cookie: &str, url: &Url) {
        self.jar.add_cookie_str(set_cookie, url);
    }

    /// Drop the built transport so the next request picks up new settings.
    fn reset_transport(&mut self) {
        self.default_transport = OnceLock::new();
    }

    /// Create a request with no method set yet.
    pub fn request(&self) -> Request<'_> {
        Request::new(self)
    }

    /// Create a GET request.
    pub fn get(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::GET).url(url)
    }

    /// Create a POST request.
    pub fn post(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::POST).url(url)
    }

    /// Create a PUT request.
    pub fn put(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::PUT).url(url)
    }

    /// Create a PATCH request.
    pub fn patch(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::PATCH).url(url)
    }

    /// Create a DELETE request.
    pub fn delete(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::DELETE).url(url)
    }

    /// Create a HEAD request.
    pub fn head(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::HEAD).url(url)
    }

    /// Create an OPTIONS request.
    pub fn options(&self, url: impl Into<String>) -> Request<'_> {
        self.request().method(Method::OPTIONS).url(url)
    }

    /// Set the base URL for relative request URLs.
    pub fn set_base_url(&mut self, url: impl AsRef<str>) -> &mut Self {
        self.config.set_base_url(url.as_ref());
        self
    }

    /// Set the per-attempt timeout of the default transport.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.config.timeout = timeout;
        self.reset_transport();
        self
    }

    /// Set the client-level user agent.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) -> &mut Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set a header sent with every request, replacing previous values.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        self.config.set_header(name.as_ref(), value.as_ref());
        self
    }

    /// Set several headers sent with every request.
    pub fn set_headers<I, K, V>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in headers {
            self.config.set_header(name.as_ref(), value.as_ref());
        }
        self
    }

    /// Append a header value sent with every request.
    pub fn add_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.config.headers.append(name, value);
        }
        self
    }

    /// Set a query parameter appended to every request.
    pub fn set_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.set_query_param(key.into(), value.into());
        self
    }

    /// Set several query parameters appended to every request.
    pub fn set_query_params<I, K, V>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in params {
            self.config.set_query_param(key.into(), value.into());
        }
        self
    }

    /// Append a query parameter value sent with every request.
    pub fn add_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.query_params.push((key.into(), value.into()));
        self
    }

    /// Set a path parameter used by every request.
    pub fn set_path_param(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.path_params.insert(key.into(), value.into());
        self
    }

    /// Set several path parameters used by every request.
    pub fn set_path_params<I, K, V>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.config
            .path_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a form field sent with every body-less request.
    pub fn set_form_data(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.set_form_field(key.into(), value.into());
        self
    }

    /// Append a form field value sent with every body-less request.
    pub fn add_form_data(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.config.form_data.push((key.into(), value.into()));
        self
    }

    /// Add cookies sent with every request.
    pub fn set_cookies(&mut self, cookies: impl IntoIterator<Item = Cookie>) -> &mut Self {
        self.config.cookies.extend(cookies);
        self
    }

    /// Enable or disable debug logging of requests and responses.
    pub fn enable_debug(&mut self, enable: bool) -> &mut Self {
        self.config.debug = enable;
        self
    }

    /// Accept invalid TLS certificates.
    pub fn set_insecure_skip_verify(&mut self, enable: bool) -> &mut Self {
        self.config.tls.insecure_skip_verify = enable;
        self.reset_transport();
        self
    }

    /// Trust an extra root certificate.
    pub fn add_root_certificate(&mut self, certificate: reqwest::Certificate) -> &mut Self {
        self.config.tls.root_certificates.push(certificate);
        self.reset_transport();
        self
    }

    /// Set the minimum TLS version.
    pub fn set_min_tls_version(&mut self, version: reqwest::tls::Version) -> &mut Self {
        self.config.tls.min_version = Some(version);
        self.reset_transport();
        self
    }

    /// Route requests through a proxy.
    pub fn set_proxy(&mut self, proxy: reqwest::Proxy) -> &mut Self {
        self.config.proxy = Some(proxy);
        self.reset_transport();
        self
    }

    /// Remove any proxy and ignore system proxy settings.
    pub fn set_no_proxy(&mut self) -> &mut Self {
        self.config.proxy = None;
        self.config.no_proxy = true;
        self.reset_transport();
        self
    }

    /// Set the number of additional attempts.
    pub fn set_retry_count(&mut self, count: u32) -> &mut Self {
        self.config.retry.count = count;
        self
    }

    /// Set the delay between attempts.
    pub fn set_retry_interval(&mut self, interval: Duration) -> &mut Self {
        self.config.retry.interval = interval;
        self
    }

    /// Set the retry condition.
    pub fn set_retry_condition<F>(&mut self, condition: F) -> &mut Self
    where
        F: Fn(Option<&Response>, Option<&HttpClientError>) -> bool + Send + Sync + 'static,
    {
        self.config.retry.condition = Arc::new(condition);
        self
    }

    /// Set the result classifier.
    pub fn set_result_classifier<F>(&mut self, classifier: F) -> &mut Self
    where
        F: Fn(&Response) -> ResultState + Send + Sync + 'static,
    {
        self.config.classifier = Arc::new(classifier);
        self
    }

    /// Decode error responses into `T` when a request registers no error type.
    pub fn set_common_error_result<T>(&mut self) -> &mut Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.config.common_error_result = Some(ResultTarget::of::<T>());
        self
    }

    /// Override the JSON codec.
    pub fn set_json_codec(&mut self, codec: impl Codec + 'static) -> &mut Self {
        self.config.codecs.set(Format::Json, Arc::new(codec));
        self
    }

    /// Override the XML codec.
    pub fn set_xml_codec(&mut self, codec: impl Codec + 'static) -> &mut Self {
        self.config.codecs.set(Format::Xml, Arc::new(codec));
        self
    }

    /// Register a hook run against every wire request before it is sent.
    pub fn on_before_request<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&HttpClient, &mut reqwest::Request) -> std::result::Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        self.config.before_request.push(Arc::new(hook));
        self
    }

    /// Register a hook run against every received response.
    pub fn on_after_response<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&HttpClient, &mut Response) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.config.after_response.push(Arc::new(hook));
        self
    }

    /// Set the hook notified when a call ends with an error.
    pub fn on_error<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&HttpClient, &Request<'_>, Option<&Response>, &HttpClientError) + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(hook));
        self
    }

    /// Send requests through a custom transport.
    pub fn set_transport(&mut self, transport: impl Transport + 'static) -> &mut Self {
        self.config.transport = Some(Arc::new(transport));
        self
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(HttpClientConfig::default())
    }
}

impl Clone for HttpClient {
    /// Deep copy of the configuration with a fresh cookie jar.
    fn clone(&self) -> Self {
        Self::new(self.config.clone())
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("transport_built", &self.default_transport.get().is_some())
            .finish_non_exhaustive()
    }
}
