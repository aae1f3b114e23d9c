//! Event Dispatch
//!
//! Drives a streamed response body through the frame decoder and hands each
//! parsed event to the caller, in order, until the body ends, a frame fails
//! to parse, or the call is cancelled.

use crate::api::streaming::{parse_event, DeltaEvent, StreamSummary};
use crate::client::decoder::{Frame, FrameDecoder};
use crate::error::{ChatError, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Whether the read loop should keep going after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

/// Consume `body` and dispatch every decoded event to `on_event`.
///
/// Each read races `cancel`, so a stalled body does not hold the call open
/// after cancellation. Cancellation is also checked before every dispatch:
/// once it fires no further events are delivered and the call fails with
/// [`ChatError::Aborted`]. The body is dropped on return, which releases the
/// underlying connection.
pub async fn dispatch_events<S, F>(
    mut body: S,
    mut decoder: FrameDecoder,
    mut on_event: F,
    cancel: &CancellationToken,
) -> Result<StreamSummary>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
    F: FnMut(DeltaEvent),
{
    let mut summary = StreamSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(events = summary.events, "stream cancelled");
                return Err(ChatError::Aborted);
            }
            next = body.next() => next,
        };

        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        tracing::trace!(bytes = chunk.len(), "received chunk");

        decoder.push(&chunk);
        while let Some(frame) = decoder.next_frame()? {
            if dispatch(frame, &mut on_event, &mut summary, cancel)? == Flow::Done {
                return Ok(summary);
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        dispatch(frame, &mut on_event, &mut summary, cancel)?;
    }

    tracing::debug!(events = summary.events, "stream completed");
    Ok(summary)
}

/// Run `fut` unless `cancel` fires first
pub async fn until_cancelled<T, Fut>(cancel: &CancellationToken, fut: Fut) -> Result<T>
where
    Fut: std::future::Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("request cancelled");
            Err(ChatError::Aborted)
        }
        result = fut => result,
    }
}

fn dispatch<F>(
    frame: Frame,
    on_event: &mut F,
    summary: &mut StreamSummary,
    cancel: &CancellationToken,
) -> Result<Flow>
where
    F: FnMut(DeltaEvent),
{
    if cancel.is_cancelled() {
        tracing::debug!(events = summary.events, "stream cancelled");
        return Err(ChatError::Aborted);
    }

    match frame {
        Frame::Done => {
            tracing::debug!(events = summary.events, "received done sentinel");
            Ok(Flow::Done)
        }
        Frame::Data(payload) => {
            tracing::trace!(payload = %payload, "dispatching event");
            let event = parse_event(&payload)?;
            if let Some(error) = &event.error {
                tracing::warn!(message = %error.message, "server reported an error in stream");
            }
            summary.observe(&event);
            on_event(event);
            Ok(Flow::Continue)
        }
    }
}
