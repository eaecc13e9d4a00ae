//! Request body payloads and their wire encoding.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;

use crate::codec::{Codecs, EncodeBody, Format};
use crate::error::{BoxError, HttpClientError, Result};

/// Chunk size used when reporting upload progress.
const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// Content type of a url-encoded form body.
pub(crate) const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Stream handle accepted by `Request::body_stream`.
pub(crate) type BodyStream = BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// Upload progress callback: `(bytes_written, bytes_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Body payload set on a request. Setting one replaces the previous one.
#[derive(Clone)]
pub(crate) enum Body {
    Bytes(Bytes),
    Text(String),
    /// Single-use; shared between clones of the same request.
    Stream(Arc<Mutex<Option<BodyStream>>>),
    Json(Arc<dyn EncodeBody>),
    Xml(Arc<dyn EncodeBody>),
}

impl Body {
    pub(crate) fn stream(stream: BodyStream) -> Self {
        Self::Stream(Arc::new(Mutex::new(Some(stream))))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
            Self::Json(_) => f.write_str("Json"),
            Self::Xml(_) => f.write_str("Xml"),
        }
    }
}

/// Bytes ready for the wire.
pub(crate) enum Payload {
    Empty,
    Full(Bytes),
    Stream(BodyStream),
}

/// Output of the body encoder.
pub(crate) struct EncodedBody {
    pub payload: Payload,
    /// Content type implied by the body kind, applied only when the caller
    /// has not set one explicitly.
    pub content_type: Option<&'static str>,
}

impl EncodedBody {
    fn new(payload: Payload, content_type: Option<&'static str>) -> Self {
        Self { payload, content_type }
    }

    /// Size in bytes when known up front.
    pub fn len(&self) -> Option<u64> {
        match &self.payload {
            Payload::Empty => Some(0),
            Payload::Full(bytes) => Some(bytes.len() as u64),
            Payload::Stream(_) => None,
        }
    }

    /// Convert into a reqwest body, reporting progress through `progress`.
    pub fn into_reqwest(self, progress: Option<&ProgressFn>) -> Option<reqwest::Body> {
        match (self.payload, progress) {
            (Payload::Empty, _) => None,
            (Payload::Full(bytes), None) => Some(reqwest::Body::from(bytes)),
            (Payload::Stream(stream), None) => Some(reqwest::Body::wrap_stream(stream)),
            (Payload::Full(bytes), Some(progress)) => {
                let total = bytes.len() as u64;
                let chunks: Vec<Bytes> = (0..bytes.len())
                    .step_by(PROGRESS_CHUNK_SIZE)
                    .map(|start| bytes.slice(start..(start + PROGRESS_CHUNK_SIZE).min(bytes.len())))
                    .collect();
                let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, BoxError>));
                Some(reqwest::Body::wrap_stream(report_progress(stream, progress.clone(), Some(total))))
            }
            (Payload::Stream(stream), Some(progress)) => {
                Some(reqwest::Body::wrap_stream(report_progress(stream, progress.clone(), None)))
            }
        }
    }
}

fn report_progress<S>(stream: S, progress: ProgressFn, total: Option<u64>) -> BodyStream
where
    S: futures::Stream<Item = std::result::Result<Bytes, BoxError>> + Send + 'static,
{
    let mut written = 0u64;
    stream
        .map(move |chunk| {
            if let Ok(chunk) = &chunk {
                written += chunk.len() as u64;
                progress(written, total);
            }
            chunk
        })
        .boxed()
}

/// Form pairs contributed by the client and the request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FormData<'a> {
    pub client: &'a [(String, String)],
    pub request: &'a [(String, String)],
}

impl FormData<'_> {
    fn is_empty(&self) -> bool {
        self.client.is_empty() && self.request.is_empty()
    }
}

/// Encode a request body.
///
/// An explicit body always wins; form data is only used when no body is set.
pub(crate) fn encode_body(body: Option<&Body>, form: FormData<'_>, codecs: &Codecs) -> Result<EncodedBody> {
    let Some(body) = body else {
        if form.is_empty() {
            return Ok(EncodedBody::new(Payload::Empty, None));
        }
        let pairs: Vec<&(String, String)> = form.client.iter().chain(form.request.iter()).collect();
        let encoded = serde_urlencoded::to_string(pairs)
            .map_err(|e| HttpClientError::Encode(e.to_string()))?;
        return Ok(EncodedBody::new(
            Payload::Full(Bytes::from(encoded)),
            Some(FORM_CONTENT_TYPE),
        ));
    };

    if !form.is_empty() {
        tracing::debug!("Request has both a body and form data, form data is ignored");
    }

    let encoded = match body {
        Body::Json(value) => EncodedBody::new(
            Payload::Full(Bytes::from(value.encode(Format::Json, codecs)?)),
            Some(Format::Json.content_type()),
        ),
        Body::Xml(value) => EncodedBody::new(
            Payload::Full(Bytes::from(value.encode(Format::Xml, codecs)?)),
            Some(Format::Xml.content_type()),
        ),
        Body::Bytes(bytes) => EncodedBody::new(Payload::Full(bytes.clone()), None),
        Body::Text(text) => EncodedBody::new(Payload::Full(Bytes::from(text.clone())), None),
        Body::Stream(slot) => {
            let stream = slot.lock().take().ok_or_else(|| {
                HttpClientError::Encode("stream body was already consumed".to_string())
            })?;
            EncodedBody::new(Payload::Stream(stream), None)
        }
    };

    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    const NO_FORM: FormData<'static> = FormData { client: &[], request: &[] };

    fn full(encoded: EncodedBody) -> Bytes {
        match encoded.payload {
            Payload::Full(bytes) => bytes,
            _ => panic!("expected a full payload"),
        }
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let body = Body::Json(Arc::new(serde_json::json!({"name": "John"})));
        let encoded = encode_body(Some(&body), NO_FORM, &Codecs::default()).unwrap();
        assert_eq!(encoded.content_type, Some("application/json"));
        assert_eq!(full(encoded), Bytes::from_static(br#"{"name":"John"}"#));
    }

    #[test]
    fn test_raw_bodies_have_no_content_type() {
        let encoded = encode_body(Some(&Body::Text("hello".into())), NO_FORM, &Codecs::default()).unwrap();
        assert_eq!(encoded.content_type, None);
        assert_eq!(encoded.len(), Some(5));

        let encoded = encode_body(
            Some(&Body::Bytes(Bytes::from_static(b"\x00\x01"))),
            NO_FORM,
            &Codecs::default(),
        )
        .unwrap();
        assert_eq!(encoded.content_type, None);
        assert_eq!(full(encoded), Bytes::from_static(b"\x00\x01"));
    }

    #[test]
    fn test_form_data_merges_client_then_request() {
        let client = vec![("a".to_string(), "1".to_string())];
        let request = vec![("b".to_string(), "x y".to_string()), ("a".to_string(), "2".to_string())];
        let form = FormData { client: &client, request: &request };
        let encoded = encode_body(None, form, &Codecs::default()).unwrap();
        assert_eq!(encoded.content_type, Some(FORM_CONTENT_TYPE));
        assert_eq!(full(encoded), Bytes::from_static(b"a=1&b=x+y&a=2"));
    }

    #[test]
    fn test_body_takes_precedence_over_form() {
        let request = vec![("a".to_string(), "1".to_string())];
        let form = FormData { client: &[], request: &request };
        let encoded = encode_body(Some(&Body::Text("raw".into())), form, &Codecs::default()).unwrap();
        assert_eq!(encoded.content_type, None);
        assert_eq!(full(encoded), Bytes::from_static(b"raw"));
    }

    #[test]
    fn test_no_body_no_form_is_empty() {
        let encoded = encode_body(None, NO_FORM, &Codecs::default()).unwrap();
        assert!(matches!(encoded.payload, Payload::Empty));
        assert!(encoded.into_reqwest(None).is_none());
    }

    #[test]
    fn test_stream_body_is_single_use() {
        let stream = futures::stream::iter(vec![Ok::<_, BoxError>(Bytes::from_static(b"chunk"))]).boxed();
        let body = Body::stream(stream);
        let shared = body.clone();

        let first = encode_body(Some(&body), NO_FORM, &Codecs::default()).unwrap();
        assert_eq!(first.len(), None);

        let second = encode_body(Some(&shared), NO_FORM, &Codecs::default());
        assert!(matches!(second, Err(HttpClientError::Encode(_))));
    }

    #[tokio::test]
    async fn test_progress_reports_each_chunk() {
        let seen = Arc::new(AtomicU64::new(0));
        let calls = Arc::new(AtomicU64::new(0));
        let progress: ProgressFn = {
            let seen = seen.clone();
            let calls = calls.clone();
            Arc::new(move |written, total| {
                assert_eq!(total, Some(PROGRESS_CHUNK_SIZE as u64 + 10));
                seen.store(written, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        let data = Bytes::from(vec![7u8; PROGRESS_CHUNK_SIZE + 10]);
        let stream = report_progress(
            futures::stream::iter(vec![
                Ok(data.slice(..PROGRESS_CHUNK_SIZE)),
                Ok(data.slice(PROGRESS_CHUNK_SIZE..)),
            ]),
            progress,
            Some(data.len() as u64),
        );
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(seen.load(Ordering::SeqCst), data.len() as u64);
    }
}
