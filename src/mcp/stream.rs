//! Streaming transport: newline-delimited JSON over one long-lived HTTP exchange
//!
//! Each connection has two halves sharing the runtime:
//!
//! - the reader task consumes the request body, spawns one dispatch task per
//!   request and logs notifications;
//! - the emitter is the response body itself, a `ResponseStream` draining the
//!   per-connection queue that dispatch tasks push their encoded responses into.
//!
//! Responses leave in completion order, so a slow tool never holds back a
//! fast one; clients correlate by id. Dropping the `ResponseStream` (client
//! disconnect) aborts the reader, which drops its `JoinSet` and with it every
//! in-flight dispatch task before it can emit anything.
//!
//! Server shutdown is signalled through a `watch` channel: the reader stops
//! consuming input, answers what is already in flight and then ends the
//! response, so graceful shutdown is not held up by idle clients.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::mcp::codec::{decode_frame, encode_frame, LineBuffer};
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::{JsonRpcMessage, JsonRpcRequest, OutboundNotification};

/// Open a streaming connection over `input` and return its response frames
///
/// The first frame is always the unsolicited `server/initialized`
/// notification, queued before any input is read. Once `shutdown` flips to
/// `true` no further input is read; a dropped sender never triggers it.
pub fn open<S, E>(handler: McpHandler, input: S, shutdown: watch::Receiver<bool>) -> ResponseStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let connection_id = Uuid::new_v4();
    let span = info_span!("stream", connection = %connection_id);
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();

    match encode_frame(&OutboundNotification::server_initialized()) {
        Ok(frame) => {
            let _ = frames_tx.send(Bytes::from(frame));
            span.in_scope(|| info!("Sent server/initialized notification"));
        }
        Err(e) => span.in_scope(|| error!("Failed to encode server/initialized: {}", e)),
    }

    let reader =
        tokio::spawn(read_requests(handler, input, frames_tx, shutdown).instrument(span));

    ResponseStream {
        frames: frames_rx,
        reader,
    }
}

/// Reader half: turn body chunks into dispatch tasks
async fn read_requests<S, E>(
    handler: McpHandler,
    input: S,
    frames: mpsc::UnboundedSender<Bytes>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::pin!(input);
    let mut lines = LineBuffer::new();
    let mut in_flight = JoinSet::new();

    let mut interrupted = false;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                info!("Server shutting down, closing request stream");
                interrupted = true;
                break;
            }
            chunk = input.next() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };

        match chunk {
            Ok(bytes) => {
                for line in lines.push(&bytes) {
                    accept_frame(&handler, &line, &frames, &mut in_flight);
                }
            }
            Err(e) => {
                warn!("Error reading request stream: {}", e);
                break;
            }
        }

        while let Some(finished) = in_flight.try_join_next() {
            log_join(finished);
        }
    }

    // A partial frame cut off by shutdown is incomplete, not a final frame.
    if !interrupted {
        if let Some(line) = lines.finish() {
            accept_frame(&handler, &line, &frames, &mut in_flight);
        }
    }

    debug!("Request stream closed, draining {} in-flight requests", in_flight.len());
    while let Some(finished) = in_flight.join_next().await {
        log_join(finished);
    }
    info!("Request stream closed.");
    // Dropping `frames` here ends the response body once it is drained.
}

/// Resolves once shutdown is requested; pending forever if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn accept_frame(
    handler: &McpHandler,
    line: &str,
    frames: &mpsc::UnboundedSender<Bytes>,
    in_flight: &mut JoinSet<()>,
) {
    debug!("Received raw line: {}", line);

    match decode_frame(line) {
        Ok(JsonRpcMessage::Request(request)) => {
            in_flight.spawn(dispatch(handler.clone(), request, frames.clone()).in_current_span());
        }
        Ok(JsonRpcMessage::Notification(notification)) => {
            info!("Received notification: {}", notification.method);
            handler.handle_notification(&notification);
        }
        Ok(JsonRpcMessage::Response(response)) => {
            debug!("Ignoring client response for id {}", response.id);
        }
        Err(e) => match e.correlation_id() {
            Some(_) => push(frames, &e.to_response()),
            None => warn!("Dropping undecodable frame: {}", e),
        },
    }
}

/// One in-flight request: handle it and queue the response
async fn dispatch(handler: McpHandler, request: JsonRpcRequest, frames: mpsc::UnboundedSender<Bytes>) {
    info!("Processing MCP method: {}, id: {}", request.method, request.id);
    let response = handler.handle_request(request).await;
    push(&frames, &response);
}

fn push<T: serde::Serialize>(frames: &mpsc::UnboundedSender<Bytes>, message: &T) {
    match encode_frame(message) {
        Ok(frame) => {
            if frames.send(Bytes::from(frame)).is_err() {
                debug!("Response stream already closed, dropping frame");
            }
        }
        Err(e) => error!("Failed to encode response: {}", e),
    }
}

fn log_join(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        if e.is_panic() {
            error!("Dispatch task panicked: {}", e);
        }
    }
}

/// Emitter half: the response body of a streaming connection
///
/// Yields newline-terminated JSON frames in the order they were queued and
/// ends once the reader has finished and every response has been yielded.
pub struct ResponseStream {
    frames: mpsc::UnboundedReceiver<Bytes>,
    reader: JoinHandle<()>,
}

impl Stream for ResponseStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.poll_recv(cx).map(|frame| frame.map(Ok))
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        // No-op when the reader already finished.
        self.reader.abort();
    }
}
