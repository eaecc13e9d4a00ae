//! Client configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::codec::{Codec, Codecs, Format, ResultTarget};
use crate::cookie::Cookie;
use crate::hooks::{AfterResponseHook, BeforeRequestHook, ErrorHook};
use crate::response::{ResultClassifier, default_classifier};
use crate::retry::RetryConfig;
use crate::transport::{TlsConfig, Transport};
use crate::{HttpClient, HttpClientError, Request, Response};

/// Client configuration: defaults shared by every request of a client.
#[derive(Clone)]
pub struct HttpClientConfig {
    /// Base URL prepended to relative request URLs, without a trailing `/`.
    pub base_url: Option<String>,
    /// Per-attempt timeout of the default transport.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Headers sent with every request.
    pub headers: HeaderMap,
    /// Query parameters appended to every request.
    pub query_params: Vec<(String, String)>,
    /// Path parameters substituted into every request URL.
    pub path_params: BTreeMap<String, String>,
    /// Form fields sent with every body-less request.
    pub form_data: Vec<(String, String)>,
    /// Cookies sent with every request.
    pub cookies: Vec<Cookie>,
    /// User agent; falls back to [`crate::DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,
    /// Log request and response details.
    pub debug: bool,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// TLS options.
    pub tls: TlsConfig,
    /// Proxy for all requests.
    pub proxy: Option<reqwest::Proxy>,
    /// Ignore system proxy settings.
    pub no_proxy: bool,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    pub(crate) before_request: Vec<Arc<dyn BeforeRequestHook>>,
    pub(crate) after_response: Vec<Arc<dyn AfterResponseHook>>,
    pub(crate) on_error: Option<Arc<dyn ErrorHook>>,
    pub(crate) classifier: Arc<dyn ResultClassifier>,
    pub(crate) common_error_result: Option<ResultTarget>,
    pub(crate) codecs: Codecs,
    pub(crate) transport: Option<Arc<dyn Transport>>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            headers: HeaderMap::new(),
            query_params: Vec::new(),
            path_params: BTreeMap::new(),
            form_data: Vec::new(),
            cookies: Vec::new(),
            user_agent: None,
            debug: false,
            retry: RetryConfig::default(),
            tls: TlsConfig::default(),
            proxy: None,
            no_proxy: false,
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
            before_request: Vec::new(),
            after_response: Vec::new(),
            on_error: None,
            classifier: Arc::new(default_classifier),
            common_error_result: None,
            codecs: Codecs::default(),
            transport: None,
        }
    }
}

impl HttpClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    pub(crate) fn set_base_url(&mut self, url: &str) {
        let trimmed = url.trim_end_matches('/');
        self.base_url = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    pub(crate) fn set_header(&mut self, name: &str, value: &str) {
        if let Some((name, value)) = parse_header(name, value) {
            self.headers.insert(name, value);
        }
    }

    pub(crate) fn set_query_param(&mut self, key: String, value: String) {
        set_pair(&mut self.query_params, key, value);
    }

    pub(crate) fn set_form_field(&mut self, key: String, value: String) {
        set_pair(&mut self.form_data, key, value);
    }
}

impl fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .field("query_params", &self.query_params)
            .field("path_params", &self.path_params)
            .field("user_agent", &self.user_agent)
            .field("debug", &self.debug)
            .field("retry", &self.retry)
            .field("before_request", &self.before_request.len())
            .field("after_response", &self.after_response.len())
            .field("common_error_result", &self.common_error_result)
            .field("codecs", &self.codecs)
            .finish_non_exhaustive()
    }
}

/// Parse a header pair, logging and skipping invalid names or values.
pub(crate) fn parse_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            tracing::warn!(header = %name, "Ignoring invalid header");
            None
        }
    }
}

/// Replace every value of `key` with a single `value`, keeping its position.
pub(crate) fn set_pair(pairs: &mut Vec<(String, String)>, key: String, value: String) {
    match pairs.iter().position(|(k, _)| *k == key) {
        Some(index) => {
            pairs[index].1 = value;
            let mut seen = false;
            pairs.retain(|(k, _)| {
                if *k != key {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => pairs.push((key, value)),
    }
}

/// Builder for client configuration.
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL for relative request URLs.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Self {
        self.config.set_base_url(url.as_ref());
        self
    }

    /// Set the per-attempt timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the connection pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set a header sent with every request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.config.set_header(name.as_ref(), value.as_ref());
        self
    }

    /// Set a query parameter appended to every request.
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.set_query_param(key.into(), value.into());
        self
    }

    /// Set a path parameter used by every request.
    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.path_params.insert(key.into(), value.into());
        self
    }

    /// Set a form field sent with every body-less request.
    pub fn form_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.set_form_field(key.into(), value.into());
        self
    }

    /// Add a cookie sent with every request.
    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.config.cookies.push(cookie);
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Enable or disable debug logging of requests and responses.
    pub fn debug(mut self, enable: bool) -> Self {
        self.config.debug = enable;
        self
    }

    /// Set retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.config.retry = config;
        self
    }

    /// Set the number of additional attempts.
    pub fn retry_count(mut self, count: u32) -> Self {
        self.config.retry.count = count;
        self
    }

    /// Set the delay between attempts.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry.interval = interval;
        self
    }

    /// Set the retry condition.
    pub fn retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(Option<&Response>, Option<&HttpClientError>) -> bool + Send + Sync + 'static,
    {
        self.config.retry.condition = Arc::new(condition);
        self
    }

    /// Accept invalid TLS certificates.
    pub fn insecure_skip_verify(mut self, enable: bool) -> Self {
        self.config.tls.insecure_skip_verify = enable;
        self
    }

    /// Trust an extra root certificate.
    pub fn add_root_certificate(mut self, certificate: reqwest::Certificate) -> Self {
        self.config.tls.root_certificates.push(certificate);
        self
    }

    /// Set the minimum TLS version.
    pub fn min_tls_version(mut self, version: reqwest::tls::Version) -> Self {
        self.config.tls.min_version = Some(version);
        self
    }

    /// Route requests through a proxy.
    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Ignore system proxy settings.
    pub fn no_proxy(mut self) -> Self {
        self.config.no_proxy = true;
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Register a before-request hook.
    pub fn before_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HttpClient, &mut reqwest::Request) -> Result<(), crate::BoxError> + Send + Sync + 'static,
    {
        self.config.before_request.push(Arc::new(hook));
        self
    }

    /// Register an after-response hook.
    pub fn after_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HttpClient, &mut Response) -> Result<(), crate::BoxError> + Send + Sync + 'static,
    {
        self.config.after_response.push(Arc::new(hook));
        self
    }

    /// Set the error hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&HttpClient, &Request<'_>, Option<&Response>, &HttpClientError) + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(hook));
        self
    }

    /// Set the result classifier.
    pub fn result_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Response) -> crate::ResultState + Send + Sync + 'static,
    {
        self.config.classifier = Arc::new(classifier);
        self
    }

    /// Decode error responses into `T` when a request registers no error type.
    pub fn common_error_result<T>(mut self) -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.config.common_error_result = Some(ResultTarget::of::<T>());
        self
    }

    /// Override the JSON codec.
    pub fn json_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.config.codecs.set(Format::Json, Arc::new(codec));
        self
    }

    /// Override the XML codec.
    pub fn xml_codec(mut self, codec: impl Codec + 'static) -> Self {
        self.config.codecs.set(Format::Xml, Arc::new(codec));
        self
    }

    /// Send requests through a custom transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.config.transport = Some(Arc::new(transport));
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.count, 0);
        assert_eq!(config.retry.interval, Duration::from_secs(1));
        assert!(config.user_agent.is_none());
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = HttpClientConfig::builder()
            .base_url("https://api.example.com///")
            .build();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn test_invalid_header_is_skipped() {
        let config = HttpClientConfig::builder()
            .header("X-Good", "yes")
            .header("bad header", "value")
            .build();
        assert_eq!(config.headers.len(), 1);
        assert_eq!(config.headers["x-good"], "yes");
    }

    #[test]
    fn test_set_pair_replaces_all_values() {
        let mut pairs = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "3".to_string()),
        ];
        set_pair(&mut pairs, "a".into(), "9".into());
        assert_eq!(
            pairs,
            vec![("a".to_string(), "9".to_string()), ("b".to_string(), "2".to_string())]
        );
        set_pair(&mut pairs, "c".into(), "4".into());
        assert_eq!(pairs.last().unwrap().0, "c");
    }

    #[test]
    fn test_retry_settings() {
        let config = HttpClientConfig::builder()
            .retry_count(2)
            .retry_interval(Duration::from_millis(10))
            .build();
        assert_eq!(config.retry.max_attempts(), 3);
        assert_eq!(config.retry.interval, Duration::from_millis(10));
    }
}
