//! Request bodies.
//!
//! A [`RequestBody`] knows its length before it is written, so the transport
//! can announce a fixed `Content-Length` and skip the write entirely for empty
//! bodies. [`StringRequestBody`] is the in-memory implementation used by every
//! request type in this crate; the [`json`](StringRequestBody::json) and
//! [`form`](StringRequestBody::form) constructors cover the two wire formats the
//! web service accepts.
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::errors::LevelUpError;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Something that can be written as the body of a request.
pub trait RequestBody: Send + Sync + fmt::Debug {
    /// MIME type sent as `Content-Type`.
    fn content_type(&self) -> &str;

    /// Number of bytes [`write_to`](Self::write_to) will produce.
    fn content_length(&self) -> usize;

    /// Writes the encoded body to `out`.
    fn write_to(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// A body held entirely in memory as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringRequestBody {
    content_type: String,
    content: String,
}

impl StringRequestBody {
    pub fn new(content_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            content: content.into(),
        }
    }

    /// Serializes `value` as a JSON document.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, LevelUpError> {
        Ok(Self::new(JSON_CONTENT_TYPE, serde_json::to_string(value)?))
    }

    /// Legacy `key=value&...` encoding. Keys are emitted in ascending order so
    /// the same pairs always produce the same body.
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let sorted: BTreeMap<String, String> = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(sorted.iter())
            .finish();
        Self::new(FORM_CONTENT_TYPE, encoded)
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

impl RequestBody for StringRequestBody {
    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn content_length(&self) -> usize {
        self.content.len()
    }

    fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(self.content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn length_counts_bytes_not_chars() {
        let body = StringRequestBody::new("text/plain", "café");
        assert_eq!(body.content_length(), 5);

        let mut out = Vec::new();
        body.write_to(&mut out).unwrap();
        assert_eq!(out.len(), body.content_length());
    }

    #[test]
    fn json_body_uses_json_mime_type() {
        let body = StringRequestBody::json(&json!({ "user": { "email": "a@b.c" } })).unwrap();
        assert_eq!(body.content_type(), JSON_CONTENT_TYPE);
        assert_eq!(body.content(), r#"{"user":{"email":"a@b.c"}}"#);
    }

    #[test]
    fn form_body_sorts_and_encodes_keys() {
        let body = StringRequestBody::form(vec![
            ("zeta", "last value"),
            ("alpha", "a&b"),
            ("mid", "x=y"),
        ]);
        assert_eq!(body.content_type(), FORM_CONTENT_TYPE);
        assert_eq!(body.content(), "alpha=a%26b&mid=x%3Dy&zeta=last+value");
    }

    #[test]
    fn empty_form_is_empty_body() {
        let body = StringRequestBody::form(Vec::<(String, String)>::new());
        assert_eq!(body.content_length(), 0);
    }
}
