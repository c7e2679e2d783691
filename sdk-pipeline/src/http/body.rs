//! Request bodies.

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, StreamExt};
use std::fmt;

/// The body of an outgoing request.
///
/// Buffered bodies can be sent any number of times. Streamed bodies are
/// consumed by the first transport that reads them and cannot be cloned, so a
/// retry over a streamed body fails instead of sending an empty payload.
#[derive(Default)]
pub enum Body {
    /// No payload.
    #[default]
    Empty,
    /// A buffered, replayable payload.
    Bytes(Bytes),
    /// A single-consumption stream of chunks.
    Stream(BoxStream<'static, std::io::Result<Bytes>>),
}

impl Body {
    /// Wraps a chunk stream as a single-consumption body.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    /// Returns true if the body can be sent more than once.
    #[must_use]
    pub fn is_replayable(&self) -> bool {
        !matches!(self, Self::Stream(_))
    }

    /// Returns true if there is no payload.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes(b) => b.is_empty(),
            Self::Stream(_) => false,
        }
    }

    /// Returns the payload length when it is known up front.
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::Empty => Some(0),
            Self::Bytes(b) => Some(b.len()),
            Self::Stream(_) => None,
        }
    }

    /// Clones a replayable body. Returns `None` for streams.
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Empty => Some(Self::Empty),
            Self::Bytes(b) => Some(Self::Bytes(b.clone())),
            Self::Stream(_) => None,
        }
    }

    /// Drains the body into a single buffer.
    pub async fn collect(self) -> std::io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Bytes(b) => Ok(b),
            Self::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Body::Empty"),
            Self::Bytes(b) => f.debug_tuple("Body::Bytes").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Body::Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Self::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_body_is_replayable() {
        let body = Body::from("payload");
        assert!(body.is_replayable());
        assert_eq!(body.len(), Some(7));

        let copy = body.try_clone();
        assert!(matches!(copy, Some(Body::Bytes(ref b)) if b.as_ref() == b"payload"));
    }

    #[test]
    fn test_stream_body_is_not_replayable() {
        let body = Body::from_stream(futures::stream::iter(vec![Ok(Bytes::from_static(b"a"))]));
        assert!(!body.is_replayable());
        assert!(body.try_clone().is_none());
        assert_eq!(body.len(), None);
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let chunks = vec![Ok(Bytes::from_static(b"he")), Ok(Bytes::from_static(b"llo"))];
        let body = Body::from_stream(futures::stream::iter(chunks));
        let bytes = body.collect().await.unwrap();
        assert_eq!(bytes.as_ref(), b"hello");
    }

    #[test]
    fn test_empty_body() {
        let body = Body::default();
        assert!(body.is_empty());
        assert_eq!(format!("{body:?}"), "Body::Empty");
    }
}
