//! Network transport and its TLS/proxy configuration.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;

use crate::{HttpClientConfig, Result};

/// Sends one wire request and returns the reply with an unread body.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request.
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        Ok(self.execute(request).await?)
    }
}

/// TLS options for the default transport.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Accept invalid certificates and host names.
    pub insecure_skip_verify: bool,
    /// Extra trusted root certificates.
    pub root_certificates: Vec<reqwest::Certificate>,
    /// Minimum accepted TLS version.
    pub min_version: Option<reqwest::tls::Version>,
}

/// Build the default reqwest transport from client configuration.
pub(crate) fn build_default(config: &HttpClientConfig, jar: Arc<Jar>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .gzip(config.gzip)
        .brotli(config.brotli)
        .cookie_provider(jar)
        .danger_accept_invalid_certs(config.tls.insecure_skip_verify);

    for certificate in &config.tls.root_certificates {
        builder = builder.add_root_certificate(certificate.clone());
    }
    if let Some(version) = config.tls.min_version {
        builder = builder.min_tls_version(version);
    }

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(proxy.clone());
    } else if config.no_proxy {
        builder = builder.no_proxy();
    }

    if config.follow_redirects {
        builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
    } else {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_default_transport() {
        let config = HttpClientConfig::builder()
            .insecure_skip_verify(true)
            .follow_redirects(false)
            .no_proxy()
            .build();
        assert!(build_default(&config, Arc::new(Jar::default())).is_ok());
    }
}
