//! NDJSON codec for line-oriented host streams.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! misbehaving peer cannot make the server buffer an unterminated message
//! forever, and parses each line into a [`Frame`].
//!
//! Blank lines, over-long lines and lines that are not valid frames are
//! logged and skipped inside the decoder: a `FramedRead` stream ends after
//! the first decoder error, and one bad line must not drop the connection.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::{FramedRead, FramedWrite};
//! use logspyq::transport::codec::FrameCodec;
//!
//! let reader = FramedRead::new(read_half, FrameCodec::new());
//! let writer = FramedWrite::new(write_half, FrameCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};
use tracing::warn;

use super::frame::Frame;
use crate::{AppError, Result};

/// Maximum accepted line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited [`Frame`] codec.
///
/// Only I/O failures surface as errors (`AppError::Io`); they end the stream.
#[derive(Debug)]
pub struct FrameCodec(LinesCodec);

impl FrameCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }

    fn next_frame(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Frame>> {
        loop {
            let decoded = if eof {
                self.0.decode_eof(src)
            } else {
                self.0.decode(src)
            };

            let line = match decoded {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(None),
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(limit = MAX_LINE_BYTES, "frame codec: line too long, discarding");
                    continue;
                }
                Err(LinesCodecError::Io(err)) => return Err(AppError::Io(err.to_string())),
            };

            if line.trim().is_empty() {
                continue;
            }

            match Frame::parse(&line) {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) => {
                    warn!(%err, "frame codec: skipping malformed line");
                }
            }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        self.next_frame(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        self.next_frame(src, true)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = AppError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<()> {
        let line = item.to_json()?;
        self.0.encode(line, dst).map_err(|err| match err {
            LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
            LinesCodecError::MaxLineLengthExceeded => {
                AppError::Protocol("line too long while encoding".into())
            }
        })
    }
}
