//! Client Module
//!
//! HTTP transport, frame decoding and event dispatch.

pub mod decoder;
pub mod http;
pub mod stream;

pub use decoder::{decode_frames, Frame, FrameDecoder, Framing};
pub use http::{ByteStream, HttpClient};
pub use stream::dispatch_events;
