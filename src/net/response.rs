//! Responses as returned by the transport and as handed to callers.
//!
//! The transport produces a [`StreamingResponse`]: status code, headers and the
//! live body stream, or an error if the exchange failed. A
//! [`BufferedResponse`] drains that stream into memory under a hard byte
//! ceiling. Going over the ceiling turns the whole read into
//! [`LevelUpError::ResponseTooLarge`]; a partial body is never returned.
//!
//! Header names are stored lower-cased, each with every value received.
use std::collections::BTreeMap;
use std::fmt;
use std::io::{ErrorKind, Read};

use serde::{Deserialize, Serialize};

use crate::errors::LevelUpError;

/// Largest body [`BufferedResponse::from_streaming`] will hold in memory.
pub const MAX_DATA_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Size of each read while buffering.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Status code of a response that never got one from the server.
pub const STATUS_CODE_UNUSED: i32 = -1;

pub type ResponseHeaders = BTreeMap<String, Vec<String>>;

/// Read access shared by every response type.
pub trait AbstractResponse {
    /// HTTP status code, or [`STATUS_CODE_UNUSED`].
    fn http_status_code(&self) -> i32;

    fn headers(&self) -> Option<&ResponseHeaders>;

    /// Transport or buffering failure, if any.
    fn error(&self) -> Option<&LevelUpError>;

    /// First value of the header `name`, matched case-insensitively.
    fn header(&self, name: &str) -> Option<&str> {
        self.headers()?
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A response whose body has not been read yet.
pub struct StreamingResponse {
    http_status_code: i32,
    headers: Option<ResponseHeaders>,
    error: Option<LevelUpError>,
    data: Option<Box<dyn Read + Send>>,
}

impl StreamingResponse {
    pub fn new(http_status_code: i32, headers: ResponseHeaders, data: Box<dyn Read + Send>) -> Self {
        Self {
            http_status_code,
            headers: Some(headers),
            error: None,
            data: Some(data),
        }
    }

    /// A response for an exchange that failed before a status was received.
    pub fn from_error(error: LevelUpError) -> Self {
        Self {
            http_status_code: STATUS_CODE_UNUSED,
            headers: None,
            error: Some(error),
            data: None,
        }
    }

    /// Gives up the body stream.
    pub fn into_data(self) -> Option<Box<dyn Read + Send>> {
        self.data
    }
}

impl AbstractResponse for StreamingResponse {
    fn http_status_code(&self) -> i32 {
        self.http_status_code
    }

    fn headers(&self) -> Option<&ResponseHeaders> {
        self.headers.as_ref()
    }

    fn error(&self) -> Option<&LevelUpError> {
        self.error.as_ref()
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("http_status_code", &self.http_status_code)
            .field("headers", &self.headers)
            .field("error", &self.error)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// Reads `reader` to the end, failing once more than `max` bytes arrive.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn read_capped(reader: &mut dyn Read, max: usize) -> Result<String, LevelUpError> {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        if buf.len() + n > max {
            return Err(LevelUpError::ResponseTooLarge { limit: max });
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// A response whose body is held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedResponse {
    http_status_code: i32,
    headers: Option<ResponseHeaders>,
    error: Option<LevelUpError>,
    data: Option<String>,
}

impl BufferedResponse {
    pub fn new(
        http_status_code: i32,
        headers: Option<ResponseHeaders>,
        data: Option<String>,
        error: Option<LevelUpError>,
    ) -> Self {
        Self {
            http_status_code,
            headers,
            error,
            data,
        }
    }

    /// Buffers `response` under [`MAX_DATA_SIZE_BYTES`].
    pub fn from_streaming(response: StreamingResponse) -> Self {
        Self::from_streaming_with_limit(response, MAX_DATA_SIZE_BYTES)
    }

    /// Buffers `response`, allowing at most `limit` bytes of body.
    ///
    /// An error already carried by `response` is kept over any error raised
    /// while reading.
    pub fn from_streaming_with_limit(response: StreamingResponse, limit: usize) -> Self {
        let StreamingResponse {
            http_status_code,
            headers,
            mut error,
            data,
        } = response;

        let data = match data {
            Some(mut stream) => match read_capped(stream.as_mut(), limit) {
                Ok(body) => Some(body),
                Err(e) => {
                    log::warn!("Failed to buffer response (status {}): {}", http_status_code, e);
                    error.get_or_insert(e);
                    None
                }
            },
            None => None,
        };

        Self {
            http_status_code,
            headers,
            error,
            data,
        }
    }

    /// The body as text, if one was read.
    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }
}

impl AbstractResponse for BufferedResponse {
    fn http_status_code(&self) -> i32 {
        self.http_status_code
    }

    fn headers(&self) -> Option<&ResponseHeaders> {
        self.headers.as_ref()
    }

    fn error(&self) -> Option<&LevelUpError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::ConnectionReset, "reset by peer"))
        }
    }

    fn streaming(body: Vec<u8>) -> StreamingResponse {
        let mut headers = ResponseHeaders::new();
        headers.insert("content-type".to_string(), vec!["application/json".to_string()]);
        StreamingResponse::new(200, headers, Box::new(Cursor::new(body)))
    }

    #[test]
    fn body_at_the_ceiling_is_read_whole() {
        let body = vec![b'a'; 100];
        let read = read_capped(&mut Cursor::new(body), 100).unwrap();
        assert_eq!(read.len(), 100);
    }

    #[test]
    fn one_byte_over_the_ceiling_is_an_error() {
        let body = vec![b'a'; 101];
        let err = read_capped(&mut Cursor::new(body), 100).unwrap_err();
        assert_eq!(err, LevelUpError::ResponseTooLarge { limit: 100 });
    }

    #[test]
    fn ceiling_spanning_several_chunks() {
        let limit = CHUNK_SIZE * 3 + 17;
        assert_eq!(read_capped(&mut Cursor::new(vec![b'x'; limit]), limit).unwrap().len(), limit);
        assert!(read_capped(&mut Cursor::new(vec![b'x'; limit + 1]), limit).is_err());
    }

    #[test]
    fn default_ceiling_accepts_exactly_max_data_size() {
        let buffered = BufferedResponse::from_streaming(streaming(vec![b'a'; MAX_DATA_SIZE_BYTES]));
        assert!(buffered.error().is_none());
        assert_eq!(buffered.data().map(str::len), Some(MAX_DATA_SIZE_BYTES));
    }

    #[test]
    fn default_ceiling_rejects_one_byte_more() {
        let buffered = BufferedResponse::from_streaming(streaming(vec![b'a'; MAX_DATA_SIZE_BYTES + 1]));
        assert_eq!(
            buffered.error(),
            Some(&LevelUpError::ResponseTooLarge { limit: MAX_DATA_SIZE_BYTES })
        );
        assert!(buffered.data().is_none());
    }

    #[test]
    fn read_errors_become_io_errors() {
        let err = read_capped(&mut FailingReader, 10).unwrap_err();
        assert!(matches!(err, LevelUpError::Io(msg) if msg.contains("reset by peer")));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let read = read_capped(&mut Cursor::new(vec![b'o', b'k', 0xff]), 10).unwrap();
        assert_eq!(read, "ok\u{fffd}");
    }

    #[test]
    fn buffering_keeps_status_and_headers() {
        let buffered = BufferedResponse::from_streaming(streaming(b"{\"ok\":true}".to_vec()));
        assert_eq!(buffered.http_status_code(), 200);
        assert_eq!(buffered.header("Content-Type"), Some("application/json"));
        assert_eq!(buffered.data(), Some("{\"ok\":true}"));
        assert!(buffered.error().is_none());
    }

    #[test]
    fn too_large_body_leaves_no_data() {
        let buffered = BufferedResponse::from_streaming_with_limit(streaming(vec![b'a'; 11]), 10);
        assert_eq!(buffered.error(), Some(&LevelUpError::ResponseTooLarge { limit: 10 }));
        assert!(buffered.data().is_none());
        assert_eq!(buffered.http_status_code(), 200);
    }

    #[test]
    fn transport_error_is_carried_over() {
        let buffered = BufferedResponse::from_streaming(StreamingResponse::from_error(LevelUpError::Network(
            "connection refused".into(),
        )));
        assert_eq!(buffered.http_status_code(), STATUS_CODE_UNUSED);
        assert!(buffered.headers().is_none());
        assert!(matches!(buffered.error(), Some(LevelUpError::Network(_))));
    }

    #[test]
    fn serde_round_trip() {
        let buffered = BufferedResponse::from_streaming(streaming(b"[]".to_vec()));
        let json = serde_json::to_string(&buffered).unwrap();
        assert_eq!(serde_json::from_str::<BufferedResponse>(&json).unwrap(), buffered);

        let failed = BufferedResponse::new(STATUS_CODE_UNUSED, None, None, Some(LevelUpError::BadRequest("x".into())));
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(serde_json::from_str::<BufferedResponse>(&json).unwrap(), failed);
    }
}
