/// Streaming transport: completion-order responses and disconnect handling
use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::watch;
use toolbox_mcp::mcp::stream::{self, ResponseStream};

use crate::common::{calls, fixture, Fixture};

type Input = mpsc::UnboundedSender<Result<Bytes, Infallible>>;

/// Open a stream whose shutdown sender is already gone, so it never fires
fn connect(fixture: &Fixture) -> (Input, ResponseStream) {
    let (_, shutdown) = watch::channel(false);
    let (tx, rx) = mpsc::unbounded();
    (tx, stream::open(fixture.handler.clone(), rx, shutdown))
}

fn connect_with_shutdown(fixture: &Fixture) -> (Input, ResponseStream, watch::Sender<bool>) {
    let (stop, shutdown) = watch::channel(false);
    let (tx, rx) = mpsc::unbounded();
    (tx, stream::open(fixture.handler.clone(), rx, shutdown), stop)
}

fn send(input: &Input, data: &str) {
    input
        .unbounded_send(Ok(Bytes::from(data.to_string())))
        .expect("stream reader is alive");
}

async fn next_frame(frames: &mut ResponseStream) -> Value {
    let frame = frames
        .next()
        .await
        .expect("stream ended early")
        .expect("frames are infallible");
    assert!(frame.ends_with(b"\n"), "frames are newline terminated");
    serde_json::from_slice(&frame).expect("frame is JSON")
}

/// Drain every frame after the initial notification
async fn remaining_frames(frames: &mut ResponseStream) -> Vec<Value> {
    let mut out = Vec::new();
    while let Some(frame) = frames.next().await {
        out.push(serde_json::from_slice(&frame.unwrap()).unwrap());
    }
    out
}

#[cfg(test)]
mod stream_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_frame_is_server_initialized() {
        let fixture = fixture();
        let (_input, mut frames) = connect(&fixture);

        let first = next_frame(&mut frames).await;
        assert_eq!(first, json!({"jsonrpc": "2.0", "method": "server/initialized", "params": {}}));
        assert!(first.get("id").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_request_overtakes_slow_one() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        send(
            &input,
            "{\"jsonrpc\":\"2.0\",\"id\":\"slow\",\"method\":\"tools/call\",\"params\":{\"name\":\"sleep\",\"arguments\":{\"ms\":500}}}\n",
        );
        send(
            &input,
            "{\"jsonrpc\":\"2.0\",\"id\":\"fast\",\"method\":\"tools/call\",\"params\":{\"name\":\"echo\",\"arguments\":{\"n\":1}}}\n",
        );

        let first = next_frame(&mut frames).await;
        let second = next_frame(&mut frames).await;

        assert_eq!(first["id"], "fast");
        assert_eq!(first["result"]["content"][0]["text"], "{\"n\":1}");
        assert_eq!(second["id"], "slow");
        assert_eq!(second["result"]["content"][0]["text"], "{\"slept_ms\":500}");
    }

    #[tokio::test]
    async fn test_every_request_answered_exactly_once() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        for id in 0..20 {
            send(&input, &format!("{{\"jsonrpc\":\"2.0\",\"id\":{},\"method\":\"ping\"}}\n", id));
        }
        drop(input);

        let mut ids: Vec<i64> = remaining_frames(&mut frames)
            .await
            .iter()
            .map(|frame| frame["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_notifications_and_garbage_produce_no_frames() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        send(&input, "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n");
        send(&input, "{definitely not json\n");
        send(&input, "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"params\":{\"name\":\"greet\",\"arguments\":{\"name\":\"x\"}}}\n");
        send(&input, "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n");
        drop(input);

        let rest = remaining_frames(&mut frames).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["id"], 1);
        assert_eq!(calls(&fixture.greet_calls), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_with_id_is_answered() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        send(&input, "{\"jsonrpc\":\"2.0\",\"id\":4,\"method\":7}\n");
        drop(input);

        let rest = remaining_frames(&mut frames).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["id"], 4);
        assert_eq!(rest[0]["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        send(&input, "{\"jsonrpc\":\"2.0\",\"id\":1,\"met");
        send(&input, "hod\":\"ping\"}\n{\"jsonrpc\":\"2.0\",");
        // The final frame has no trailing newline
        send(&input, "\"id\":2,\"method\":\"ping\"}");
        drop(input);

        let mut ids: Vec<i64> = remaining_frames(&mut frames)
            .await
            .iter()
            .map(|frame| frame["id"].as_i64().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_input_drains_in_flight_requests() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        send(
            &input,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"sleep\",\"arguments\":{\"ms\":200}}}\n",
        );
        drop(input);

        let rest = remaining_frames(&mut frames).await;
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["id"], 1);
        assert_eq!(calls(&fixture.sleep_completed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_in_flight_requests() {
        let fixture = fixture();
        let (input, mut frames) = connect(&fixture);
        next_frame(&mut frames).await;

        send(
            &input,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"sleep\",\"arguments\":{\"ms\":500}}}\n",
        );
        // Let the reader pick the request up and start the tool
        tokio::time::sleep(Duration::from_millis(10)).await;

        drop(frames);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(calls(&fixture.sleep_completed), 0);
        assert!(input.is_closed(), "reader should be gone");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_stream_after_answering_in_flight() {
        let fixture = fixture();
        let (input, mut frames, stop) = connect_with_shutdown(&fixture);
        next_frame(&mut frames).await;

        send(
            &input,
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"sleep\",\"arguments\":{\"ms\":200}}}\n",
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The client keeps its request body open; only shutdown can end the stream
        stop.send_replace(true);
        let rest = remaining_frames(&mut frames).await;

        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["id"], 1);
        assert_eq!(calls(&fixture.sleep_completed), 1);

        // Input arriving after shutdown is never read
        assert!(input.is_closed());
    }

    #[tokio::test]
    async fn test_partial_frame_at_shutdown_is_discarded() {
        let fixture = fixture();
        let (input, mut frames, stop) = connect_with_shutdown(&fixture);
        next_frame(&mut frames).await;

        send(&input, "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}");
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.send_replace(true);

        assert!(remaining_frames(&mut frames).await.is_empty());
    }
}
