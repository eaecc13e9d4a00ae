//! HTTP response snapshot and result classification.

use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Version};
use serde::de::DeserializeOwned;
use url::Url;

use crate::codec::{Codecs, DecodedValue, Format};
use crate::cookie::Cookie;
use crate::{HttpClientError, Result};

/// Outcome class of a response, decided once by the client's classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultState {
    /// The request succeeded.
    Success,
    /// The server reported an error.
    Error,
    /// Neither (informational, redirect, or not yet classified).
    #[default]
    Unknown,
}

/// Maps a received response to a [`ResultState`].
pub trait ResultClassifier: Send + Sync {
    /// Classify the response.
    fn classify(&self, response: &Response) -> ResultState;
}

impl<F> ResultClassifier for F
where
    F: Fn(&Response) -> ResultState + Send + Sync,
{
    fn classify(&self, response: &Response) -> ResultState {
        self(response)
    }
}

/// Default classifier: 2xx is success, 4xx and 5xx are errors, the rest unknown.
pub fn default_classifier(response: &Response) -> ResultState {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        ResultState::Success
    } else if status >= 400 {
        ResultState::Error
    } else {
        ResultState::Unknown
    }
}

/// HTTP response of one attempt.
pub struct Response {
    method: Method,
    url: Url,
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    received_at: SystemTime,
    duration: Duration,
    state: ResultState,
    success_result: Option<DecodedValue>,
    error_result: Option<DecodedValue>,
}

impl Response {
    pub(crate) fn new(
        method: Method,
        url: Url,
        status: StatusCode,
        version: Version,
        headers: HeaderMap,
        body: Bytes,
        duration: Duration,
    ) -> Self {
        Self {
            method,
            url,
            status,
            version,
            headers,
            body,
            received_at: SystemTime::now(),
            duration,
            state: ResultState::Unknown,
            success_result: None,
            error_result: None,
        }
    }

    pub(crate) fn set_state(&mut self, state: ResultState) {
        self.state = state;
    }

    pub(crate) fn set_success_result(&mut self, value: DecodedValue) {
        self.success_result = Some(value);
    }

    pub(crate) fn set_error_result(&mut self, value: DecodedValue) {
        self.error_result = Some(value);
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Status line text, e.g. `200 OK`.
    pub fn status_line(&self) -> String {
        match self.status.canonical_reason() {
            Some(reason) => format!("{} {}", self.status.as_u16(), reason),
            None => self.status.as_u16().to_string(),
        }
    }

    /// HTTP version of the response.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Protocol string, e.g. `HTTP/1.1`.
    pub fn proto(&self) -> String {
        format!("{:?}", self.version)
    }

    /// Classification decided when the response was received.
    pub fn state(&self) -> ResultState {
        self.state
    }

    /// True when classified as [`ResultState::Success`].
    pub fn is_success(&self) -> bool {
        self.state == ResultState::Success
    }

    /// True when classified as [`ResultState::Error`].
    pub fn is_error(&self) -> bool {
        self.state == ResultState::Error
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access for after-response hooks.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Final URL of the request that produced this response.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Method of the request that produced this response.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Replace the body (after-response hooks).
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Consume the response and return the body as bytes.
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Body size in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Time the response was received.
    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// Time spent sending the request and reading the response.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Codecs::default().decode(Format::Json, &self.body)
    }

    /// Parse the response body as XML.
    pub fn xml<T: DeserializeOwned>(&self) -> Result<T> {
        Codecs::default().decode(Format::Xml, &self.body)
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE)
    }

    /// Get the content length header if available.
    pub fn content_length(&self) -> Option<u64> {
        self.header(http::header::CONTENT_LENGTH)
            .and_then(|v| v.parse().ok())
    }

    fn content_type_contains(&self, needle: &str) -> bool {
        self.content_type().is_some_and(|ct| ct.contains(needle))
    }

    /// Content type is JSON.
    pub fn is_json(&self) -> bool {
        self.content_type_contains("application/json")
    }

    /// Content type is XML.
    pub fn is_xml(&self) -> bool {
        self.content_type_contains("application/xml") || self.content_type_contains("text/xml")
    }

    /// Content type is HTML.
    pub fn is_html(&self) -> bool {
        self.content_type_contains("text/html")
    }

    /// Content type is plain text.
    pub fn is_text(&self) -> bool {
        self.content_type_contains("text/plain")
    }

    /// The `Location` header (redirects).
    pub fn location(&self) -> Option<&str> {
        self.header(http::header::LOCATION)
    }

    /// Cookies set by the server.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(Cookie::parse_set_cookie)
            .collect()
    }

    /// The auto-decoded success result, if its type is `T`.
    pub fn success_result<T: 'static>(&self) -> Option<&T> {
        self.success_result.as_ref()?.downcast_ref()
    }

    /// Take the auto-decoded success result out of the response.
    pub fn take_success_result<T: 'static>(&mut self) -> Option<T> {
        take_as(&mut self.success_result)
    }

    /// The auto-decoded error result, if its type is `T`.
    pub fn error_result<T: 'static>(&self) -> Option<&T> {
        self.error_result.as_ref()?.downcast_ref()
    }

    /// Take the auto-decoded error result out of the response.
    pub fn take_error_result<T: 'static>(&mut self) -> Option<T> {
        take_as(&mut self.error_result)
    }
}

fn take_as<T: 'static>(slot: &mut Option<DecodedValue>) -> Option<T> {
    if !slot.as_ref()?.is::<T>() {
        return None;
    }
    slot.take()?.downcast().ok().map(|value| *value)
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("status", &self.status)
            .field("state", &self.state)
            .field("size", &self.body.len())
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn test_response(status: u16, headers: &[(&str, &str)], body: &str) -> Response {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(
            http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            http::HeaderValue::from_str(value).unwrap(),
        );
    }
    Response::new(
        Method::GET,
        Url::parse("http://localhost/test").unwrap(),
        StatusCode::from_u16(status).unwrap(),
        Version::HTTP_11,
        map,
        Bytes::from(body.to_string()),
        Duration::from_millis(5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_default_classifier() {
        for (status, expected) in [
            (100, ResultState::Unknown),
            (200, ResultState::Success),
            (204, ResultState::Success),
            (299, ResultState::Success),
            (301, ResultState::Unknown),
            (399, ResultState::Unknown),
            (400, ResultState::Error),
            (404, ResultState::Error),
            (503, ResultState::Error),
        ] {
            let response = test_response(status, &[], "");
            assert_eq!(default_classifier(&response), expected, "status {status}");
        }
    }

    #[test]
    fn test_state_is_cached_not_derived() {
        let mut response = test_response(200, &[], "");
        assert!(!response.is_success());
        response.set_state(ResultState::Error);
        assert!(response.is_error());
        assert!(!response.is_success());
    }

    #[test]
    fn test_content_type_helpers() {
        let response = test_response(200, &[("content-type", "text/xml; charset=utf-8")], "");
        assert!(response.is_xml());
        assert!(!response.is_json());
        assert!(!response.is_html());

        let response = test_response(200, &[("content-type", "text/plain")], "hi");
        assert!(response.is_text());
        assert_eq!(response.text().unwrap(), "hi");
    }

    #[test]
    fn test_json_and_xml_helpers() {
        let response = test_response(200, &[], r#"{"name":"Jane","age":25}"#);
        let user: User = response.json().unwrap();
        assert_eq!(user, User { name: "Jane".into(), age: 25 });

        let response = test_response(200, &[], "<user><name>Jane</name><age>25</age></user>");
        let user: User = response.xml().unwrap();
        assert_eq!(user.age, 25);
    }

    #[test]
    fn test_status_line_and_proto() {
        let response = test_response(404, &[], "");
        assert_eq!(response.status_line(), "404 Not Found");
        assert_eq!(response.proto(), "HTTP/1.1");
    }

    #[test]
    fn test_cookies_and_location() {
        let response = test_response(
            302,
            &[
                ("set-cookie", "session=abc; Path=/"),
                ("set-cookie", "theme=dark"),
                ("location", "/next"),
            ],
            "",
        );
        let cookies = response.cookies();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name(), "session");
        assert_eq!(cookies[1].value(), "dark");
        assert_eq!(response.location(), Some("/next"));
    }

    #[test]
    fn test_decoded_results_downcast() {
        let mut response = test_response(200, &[], "");
        response.set_success_result(Box::new(User { name: "John".into(), age: 30 }));

        assert!(response.success_result::<String>().is_none());
        assert_eq!(response.success_result::<User>().unwrap().name, "John");
        assert!(response.take_success_result::<String>().is_none());
        assert_eq!(response.take_success_result::<User>().unwrap().age, 30);
        assert!(response.success_result::<User>().is_none());
        assert!(response.error_result::<User>().is_none());
    }
}
