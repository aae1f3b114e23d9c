//! Frame Decoder
//!
//! Incremental reassembly of `data: <json>` frames from a response body that
//! arrives in arbitrary chunks.
//!
//! The decoder keeps raw bytes rather than text. Frame boundaries are ASCII,
//! so a multi-byte character split across two reads is never cut in half.
//! Each complete frame is decoded to text when it is extracted; invalid
//! sequences become U+FFFD. Frames are handed out one at a time and only the
//! trailing partial frame stays buffered.

use crate::error::{ChatError, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// Literal frame delimiter used by the wire format
pub const DATA_MARKER_STR: &str = "data: ";

/// [`DATA_MARKER_STR`] as bytes
pub const DATA_MARKER: &[u8] = DATA_MARKER_STR.as_bytes();

/// Payload announcing the end of the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Upper bound on bytes held back waiting for a frame boundary
pub const DEFAULT_MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// SSE fields other than `data` that carry no payload
const SSE_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// How frame boundaries are located in the byte stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Server-sent-events lines: a frame is a complete `data:` line.
    ///
    /// Lines that are neither `data:`, comments nor other SSE fields are
    /// kept and decoded together as one final frame when the body ends, so
    /// a plain JSON body is still delivered.
    #[default]
    Lines,

    /// Everything before the last `data: ` occurrence is complete and is
    /// split on the delimiter. A payload containing the literal delimiter is
    /// split too; kept for servers that do not terminate frames with a
    /// newline.
    DataMarker,
}

/// A complete frame extracted from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON payload of one event
    Data(String),

    /// The `[DONE]` sentinel
    Done,
}

impl Frame {
    fn from_payload(payload: &str) -> Option<Self> {
        let payload = payload.trim();
        if payload.is_empty() {
            None
        } else if payload == DONE_SENTINEL {
            Some(Frame::Done)
        } else {
            Some(Frame::Data(payload.to_string()))
        }
    }
}

/// What a single SSE line carries
enum Line<'a> {
    /// Blank line, comment or non-data field
    Skip,
    /// Payload of a `data:` line
    Data(&'a str),
    /// Text outside the SSE format
    Bare(&'a str),
}

impl<'a> Line<'a> {
    fn classify(line: &'a str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty()
            || line.starts_with(':')
            || SSE_FIELDS.iter().any(|field| line.starts_with(field))
        {
            return Line::Skip;
        }
        match line.strip_prefix("data:") {
            Some(data) => Line::Data(data.strip_prefix(' ').unwrap_or(data)),
            None => Line::Bare(line),
        }
    }
}

/// Stateful frame decoder for one streaming call
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,

    /// Bytes not yet assigned to a frame
    buffer: BytesMut,

    /// Prefix of `buffer` already searched for a boundary
    scanned: usize,

    /// Complete bare lines, decoded as the final frame (`Lines` only)
    unframed: BytesMut,

    max_frame_bytes: usize,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new(framing: Framing) -> Self {
        Self::with_remainder(framing, &[])
    }

    /// Resume decoding from a previously returned remainder
    pub fn with_remainder(framing: Framing, remainder: &[u8]) -> Self {
        Self {
            framing,
            buffer: BytesMut::from(remainder),
            scanned: 0,
            unframed: BytesMut::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Limit how many bytes may be held back waiting for a boundary
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Number of bytes held back waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len() + self.unframed.len()
    }

    /// Append one chunk of the body
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Take the next complete frame, in stream order.
    ///
    /// Returns `Ok(None)` when more bytes are needed, and a parse error once
    /// the held-back bytes exceed the frame size limit.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        while let Some(end) = self.find_boundary() {
            let raw = self.buffer.split_to(end);
            self.scanned = 0;
            if let Some(frame) = self.decode_segment(raw) {
                return Ok(Some(frame));
            }
        }

        if self.buffered() > self.max_frame_bytes {
            let head = &self.buffer[..self.buffer.len().min(512)];
            return Err(ChatError::parse(
                format!("frame exceeds {} bytes", self.max_frame_bytes),
                &String::from_utf8_lossy(head),
            ));
        }
        Ok(None)
    }

    /// Signal end of stream; decode whatever is left as one final frame
    pub fn finish(&mut self) -> Option<Frame> {
        let mut rest = self.unframed.split();
        rest.extend_from_slice(&self.buffer.split());
        self.scanned = 0;

        let text = String::from_utf8_lossy(&rest);
        match self.framing {
            Framing::Lines => match Line::classify(&text) {
                Line::Skip => None,
                Line::Data(payload) | Line::Bare(payload) => Frame::from_payload(payload),
            },
            Framing::DataMarker => {
                let text = text.trim_start();
                Frame::from_payload(text.strip_prefix(DATA_MARKER_STR).unwrap_or(text))
            }
        }
    }

    /// Take the undecoded remainder
    pub fn into_remainder(self) -> BytesMut {
        let mut rest = self.unframed;
        rest.extend_from_slice(&self.buffer);
        rest
    }

    /// End offset of the next complete segment, scanning only new bytes
    fn find_boundary(&mut self) -> Option<usize> {
        let found = match self.framing {
            Framing::Lines => self.buffer[self.scanned..]
                .iter()
                .position(|b| *b == b'\n')
                .map(|pos| self.scanned + pos + 1),
            Framing::DataMarker => {
                // A segment ends where the next delimiter starts; one at offset 0 opens it
                let start = self
                    .scanned
                    .saturating_sub(DATA_MARKER.len() - 1)
                    .max(1);
                self.buffer
                    .get(start..)
                    .and_then(|tail| find(tail, DATA_MARKER))
                    .map(|pos| start + pos)
            }
        };

        if found.is_none() {
            self.scanned = self.buffer.len();
        }
        found
    }

    fn decode_segment(&mut self, raw: BytesMut) -> Option<Frame> {
        let text = String::from_utf8_lossy(&raw);
        match self.framing {
            Framing::Lines => {
                let line = text.strip_suffix('\n').unwrap_or(&text);
                match Line::classify(line) {
                    Line::Skip => {
                        tracing::trace!(line, "skipping line");
                        None
                    }
                    Line::Data(payload) => Frame::from_payload(payload),
                    Line::Bare(_) => {
                        self.unframed.extend_from_slice(&raw);
                        None
                    }
                }
            }
            Framing::DataMarker => {
                Frame::from_payload(text.strip_prefix(DATA_MARKER_STR).unwrap_or(&text))
            }
        }
    }
}

/// Pure form of the decoder.
///
/// Given the remainder left by the previous call and a new chunk, returns the
/// frames completed by the chunk and the new remainder.
pub fn decode_frames(
    framing: Framing,
    remainder: &[u8],
    chunk: &[u8],
) -> Result<(Vec<Frame>, BytesMut)> {
    let mut decoder = FrameDecoder::with_remainder(framing, remainder);
    decoder.push(chunk);

    let mut frames = Vec::new();
    while let Some(frame) = decoder.next_frame()? {
        frames.push(frame);
    }
    Ok((frames, decoder.into_remainder()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
