//! JSON/XML codecs and typed result targets.
//!
//! Bodies and result targets are typed at the call site and erased here, so
//! a client can swap the codec for a format without the request builder
//! becoming generic. A `Codec` override works on `serde_json::Value`; when no
//! override is installed the typed value goes straight through `serde_json`
//! or `quick-xml`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BoxError, HttpClientError, Result};

/// Pluggable codec for one wire format.
pub trait Codec: Send + Sync {
    /// Encode a value into bytes.
    fn encode(&self, value: &serde_json::Value) -> std::result::Result<Vec<u8>, BoxError>;

    /// Decode bytes into a value.
    fn decode(&self, bytes: &[u8]) -> std::result::Result<serde_json::Value, BoxError>;
}

/// Wire format of an encoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
}

impl Format {
    /// Content type emitted for a body of this format.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }

    /// Pick a decoding format from a response content type.
    ///
    /// Anything that is not recognisably XML decodes as JSON.
    pub fn sniff(content_type: &str) -> Self {
        if content_type.contains("application/json") {
            Self::Json
        } else if content_type.contains("application/xml") || content_type.contains("text/xml") {
            Self::Xml
        } else {
            Self::Json
        }
    }
}

/// Codec overrides for a client.
#[derive(Clone, Default)]
pub struct Codecs {
    json: Option<Arc<dyn Codec>>,
    xml: Option<Arc<dyn Codec>>,
}

impl Codecs {
    pub(crate) fn set(&mut self, format: Format, codec: Arc<dyn Codec>) {
        match format {
            Format::Json => self.json = Some(codec),
            Format::Xml => self.xml = Some(codec),
        }
    }

    fn override_for(&self, format: Format) -> Option<&Arc<dyn Codec>> {
        match format {
            Format::Json => self.json.as_ref(),
            Format::Xml => self.xml.as_ref(),
        }
    }

    /// Encode a value with the codec registered for `format`.
    pub fn encode<T: Serialize + ?Sized>(&self, format: Format, value: &T) -> Result<Vec<u8>> {
        if let Some(codec) = self.override_for(format) {
            let value = serde_json::to_value(value).map_err(encode_err)?;
            return codec.encode(&value).map_err(encode_err);
        }

        match format {
            Format::Json => serde_json::to_vec(value).map_err(encode_err),
            Format::Xml => quick_xml::se::to_string(value)
                .map(String::into_bytes)
                .map_err(encode_err),
        }
    }

    /// Decode bytes with the codec registered for `format`.
    pub fn decode<T: DeserializeOwned>(&self, format: Format, bytes: &[u8]) -> Result<T> {
        if let Some(codec) = self.override_for(format) {
            let value = codec.decode(bytes).map_err(decode_err)?;
            return serde_json::from_value(value).map_err(decode_err);
        }

        match format {
            Format::Json => serde_json::from_slice(bytes).map_err(decode_err),
            Format::Xml => quick_xml::de::from_reader(bytes).map_err(decode_err),
        }
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs")
            .field("json_override", &self.json.is_some())
            .field("xml_override", &self.xml.is_some())
            .finish()
    }
}

fn encode_err(e: impl fmt::Display) -> HttpClientError {
    HttpClientError::Encode(e.to_string())
}

fn decode_err(e: impl fmt::Display) -> HttpClientError {
    HttpClientError::Decode(e.to_string())
}

/// A body value that can be encoded later with the client's codecs.
pub(crate) trait EncodeBody: Send + Sync {
    fn encode(&self, format: Format, codecs: &Codecs) -> Result<Vec<u8>>;
}

impl<T: Serialize + Send + Sync> EncodeBody for T {
    fn encode(&self, format: Format, codecs: &Codecs) -> Result<Vec<u8>> {
        codecs.encode(format, self)
    }
}

pub(crate) type DecodedValue = Box<dyn Any + Send + Sync>;

type DecodeFn = fn(&Codecs, Format, &[u8]) -> Result<DecodedValue>;

/// Type-erased destination for an auto-decoded response body.
#[derive(Clone, Copy)]
pub(crate) struct ResultTarget {
    type_name: &'static str,
    decode: DecodeFn,
}

impl ResultTarget {
    pub(crate) fn of<T>() -> Self
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            decode: decode_erased::<T>,
        }
    }

    pub(crate) fn decode(&self, codecs: &Codecs, format: Format, bytes: &[u8]) -> Result<DecodedValue> {
        (self.decode)(codecs, format, bytes)
    }
}

impl fmt::Debug for ResultTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResultTarget").field(&self.type_name).finish()
    }
}

fn decode_erased<T>(codecs: &Codecs, format: Format, bytes: &[u8]) -> Result<DecodedValue>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    codecs
        .decode::<T>(format, bytes)
        .map(|value| Box::new(value) as DecodedValue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: u32,
    }

    struct UppercaseKeys;

    impl Codec for UppercaseKeys {
        fn encode(&self, value: &serde_json::Value) -> std::result::Result<Vec<u8>, BoxError> {
            let mut out = serde_json::Map::new();
            if let Some(map) = value.as_object() {
                for (k, v) in map {
                    out.insert(k.to_uppercase(), v.clone());
                }
            }
            Ok(serde_json::to_vec(&out)?)
        }

        fn decode(&self, bytes: &[u8]) -> std::result::Result<serde_json::Value, BoxError> {
            let value: serde_json::Value = serde_json::from_slice(bytes)?;
            let mut out = serde_json::Map::new();
            if let Some(map) = value.as_object() {
                for (k, v) in map {
                    out.insert(k.to_lowercase(), v.clone());
                }
            }
            Ok(serde_json::Value::Object(out))
        }
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(Format::sniff("application/json; charset=utf-8"), Format::Json);
        assert_eq!(Format::sniff("application/xml"), Format::Xml);
        assert_eq!(Format::sniff("text/xml; charset=utf-8"), Format::Xml);
        assert_eq!(Format::sniff("text/plain"), Format::Json);
        assert_eq!(Format::sniff(""), Format::Json);
    }

    #[test]
    fn test_xml_decode_typed() {
        let codecs = Codecs::default();
        let user: User = codecs
            .decode(Format::Xml, b"<User><name>John</name><age>30</age></User>")
            .unwrap();
        assert_eq!(user, User { name: "John".into(), age: 30 });
    }

    #[test]
    fn test_xml_encode_uses_struct_name_as_root() {
        let codecs = Codecs::default();
        let bytes = codecs
            .encode(Format::Xml, &User { name: "Jane".into(), age: 25 })
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "<User><name>Jane</name><age>25</age></User>"
        );
    }

    #[test]
    fn test_override_codec_is_used() {
        let mut codecs = Codecs::default();
        codecs.set(Format::Json, Arc::new(UppercaseKeys));

        let bytes = codecs
            .encode(Format::Json, &serde_json::json!({"name": "John"}))
            .unwrap();
        assert_eq!(bytes, br#"{"NAME":"John"}"#);

        let user: User = codecs
            .decode(Format::Json, br#"{"NAME":"John","AGE":30}"#)
            .unwrap();
        assert_eq!(user.age, 30);
    }

    #[test]
    fn test_decode_failure_maps_to_decode_error() {
        let codecs = Codecs::default();
        let err = codecs.decode::<User>(Format::Json, b"not json").unwrap_err();
        assert!(matches!(err, HttpClientError::Decode(_)));
    }

    #[test]
    fn test_result_target_downcasts() {
        let target = ResultTarget::of::<User>();
        let value = target
            .decode(&Codecs::default(), Format::Json, br#"{"name":"John","age":30}"#)
            .unwrap();
        let user = value.downcast_ref::<User>().unwrap();
        assert_eq!(user.name, "John");
        assert!(format!("{target:?}").contains("User"));
    }
}
