//! Length-prefixed frame reading from the editor's byte stream.
//!
//! Every frame is a 4-byte big-endian length followed by that many payload
//! bytes. Framing is delegated to [`LengthDelimitedCodec`], so callers only
//! ever see complete frames.

use bytes::Bytes;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};

/// Default upper bound for a single frame (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum FrameError {
    /// The transport failed, a frame exceeded the size limit, or the stream
    /// closed in the middle of a frame.
    #[error("failed to read frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload of {len} bytes does not fit a frame header")]
    Oversized { len: usize },
}

/// Forward-only sequence of frames read from an async byte stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: FramedRead<R, LengthDelimitedCodec>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_len: usize) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(HEADER_LEN)
            .big_endian()
            .max_frame_length(max_frame_len)
            .new_codec();
        Self {
            inner: FramedRead::new(reader, codec),
        }
    }

    /// Wait for the next complete frame.
    ///
    /// Returns `Ok(None)` once the stream closes on a frame boundary.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Io`] if reading fails, the frame is larger than
    /// the configured limit, or the stream ends mid-frame.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        match self.inner.next().await {
            Some(Ok(frame)) => Ok(Some(frame.freeze())),
            Some(Err(err)) => Err(FrameError::Io(err)),
            None => Ok(None),
        }
    }
}

/// Encode `payload` as a single frame (writer side of the protocol).
///
/// # Errors
///
/// Returns [`FrameError::Oversized`] if the payload length does not fit in
/// the 32-bit header.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::Oversized {
        len: payload.len(),
    })?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(payloads: &[&str]) -> Vec<u8> {
        payloads
            .iter()
            .flat_map(|p| encode_frame(p.as_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_encode_frame_prefixes_big_endian_length() {
        let frame = encode_frame(b"show").unwrap();
        assert_eq!(frame, vec![0, 0, 0, 4, b's', b'h', b'o', b'w']);
    }

    #[tokio::test]
    async fn test_reads_frames_in_order_then_ends() {
        let input = frames(&["show", "# Title"]);
        let mut reader = FrameReader::new(input.as_slice(), DEFAULT_MAX_FRAME_LEN);

        assert_eq!(reader.next_frame().await.unwrap().unwrap(), "show");
        assert_eq!(reader.next_frame().await.unwrap().unwrap(), "# Title");
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_frame_is_a_frame() {
        let input = frames(&[""]);
        let mut reader = FrameReader::new(input.as_slice(), DEFAULT_MAX_FRAME_LEN);

        let frame = reader.next_frame().await.unwrap().unwrap();
        assert!(frame.is_empty());
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_stream_ends_without_error() {
        let mut reader = FrameReader::new(&b""[..], DEFAULT_MAX_FRAME_LEN);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_is_an_error() {
        let mut input = encode_frame(b"scroll").unwrap();
        input.truncate(input.len() - 2);
        let mut reader = FrameReader::new(input.as_slice(), DEFAULT_MAX_FRAME_LEN);

        assert!(matches!(
            reader.next_frame().await,
            Err(FrameError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_frame_over_limit_is_rejected() {
        let input = frames(&["0123456789"]);
        let mut reader = FrameReader::new(input.as_slice(), 4);

        assert!(reader.next_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_frames_split_across_reads_are_reassembled() {
        let (mut writer, reader) = tokio::io::duplex(8);
        let input = frames(&["base", "/home/user/notes"]);
        let feed = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for chunk in input.chunks(3) {
                writer.write_all(chunk).await.unwrap();
            }
        });

        let mut reader = FrameReader::new(reader, DEFAULT_MAX_FRAME_LEN);
        assert_eq!(reader.next_frame().await.unwrap().unwrap(), "base");
        assert_eq!(
            reader.next_frame().await.unwrap().unwrap(),
            "/home/user/notes"
        );
        feed.await.unwrap();
        assert!(reader.next_frame().await.unwrap().is_none());
    }
}
