/// Stdio transport: line in, line out, strictly in order
use std::io::{self, ErrorKind};
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadBuf};
use toolbox_mcp::{McpServer, ServerError};

use crate::common::{calls, fixture};

/// Output whose peer has gone away
struct ClosedPipe;

impl AsyncWrite for ClosedPipe {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::from(ErrorKind::BrokenPipe)))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Input that fails on every read
struct FailingInput;

impl AsyncRead for FailingInput {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::from(ErrorKind::ConnectionReset)))
    }
}

/// Feed `input` through the stdio loop and return every response line as JSON
async fn run_session(input: &str) -> Vec<Value> {
    let fixture = fixture();
    let server = McpServer::new(fixture.handler);
    let mut output = Vec::new();

    server
        .serve(input.as_bytes(), &mut output, std::future::pending())
        .await
        .expect("session should end cleanly at EOF");

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).expect("every output line is JSON"))
        .collect()
}

#[cfg(test)]
mod stdio_tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_call() {
        let responses = run_session(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"echo\",\"arguments\":{\"msg\":\"hi\"}}}\n",
        )
        .await;

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["jsonrpc"], "2.0");
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["isError"], false);
        assert_eq!(
            responses[0]["result"]["content"][0],
            json!({"type": "text", "text": "{\"msg\":\"hi\"}"})
        );
    }

    #[tokio::test]
    async fn test_responses_follow_request_order() {
        // The slow call comes first and must still be answered first.
        let input = [
            r#"{"jsonrpc":"2.0","id":"slow","method":"tools/call","params":{"name":"sleep","arguments":{"ms":50}}}"#,
            r#"{"jsonrpc":"2.0","id":"fast","method":"ping"}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/list"}"#,
        ]
        .join("\n");

        let responses = run_session(&input).await;
        let ids: Vec<Value> = responses.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("slow"), json!("fast"), json!(3)]);
    }

    #[tokio::test]
    async fn test_notifications_and_blank_lines_produce_nothing() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "\n",
            "   \n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"params\":{\"name\":\"echo\"}}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
        );

        let responses = run_session(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"], json!({"pong": true}));
    }

    #[tokio::test]
    async fn test_notification_never_invokes_tools() {
        let fixture = fixture();
        let greet_calls = fixture.greet_calls.clone();
        let server = McpServer::new(fixture.handler);
        let mut output = Vec::new();

        let input = "{\"jsonrpc\":\"2.0\",\"method\":\"tools/call\",\"params\":{\"name\":\"greet\",\"arguments\":{\"name\":\"x\"}}}\n";
        server
            .serve(input.as_bytes(), &mut output, std::future::pending())
            .await
            .unwrap();

        assert!(output.is_empty());
        assert_eq!(calls(&greet_calls), 0);
    }

    #[tokio::test]
    async fn test_parse_error_then_keeps_going() {
        let input = "{this is not json\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";
        let responses = run_session(input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], -32700);
        assert_eq!(responses[1]["id"], 2);
    }

    #[tokio::test]
    async fn test_falsy_ids_are_still_requests() {
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":0,\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":\"\",\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"id\":null,\"method\":\"ping\"}\n",
        );
        let responses = run_session(input).await;

        let ids: Vec<Value> = responses.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(0), json!(""), Value::Null]);
        assert!(responses.iter().all(|r| r["result"]["pong"] == true));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let responses =
            run_session("{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"resources/list\"}\n").await;

        assert_eq!(responses[0]["id"], 5);
        assert_eq!(responses[0]["error"]["code"], -32601);
        assert!(responses[0].get("result").is_none());
    }

    #[tokio::test]
    async fn test_initialize_reports_server_identity() {
        let responses = run_session(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\",\"params\":{\"protocolVersion\":\"2024-11-05\"}}\n",
        )
        .await;

        let result = &responses[0]["result"];
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "toolbox-mcp");
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_tools_list_matches_registry() {
        let responses =
            run_session("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n").await;

        let names: Vec<&str> = responses[0]["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|tool| tool["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["echo", "greet", "sleep", "explode"]);
    }

    #[tokio::test]
    async fn test_tool_failure_is_a_result_not_a_protocol_error() {
        let responses = run_session(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"explode\"}}\n",
        )
        .await;

        assert!(responses[0].get("error").is_none());
        assert_eq!(responses[0]["result"]["isError"], true);
        let text = responses[0]["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_tools_call_without_params_is_invalid() {
        let responses =
            run_session("{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\"}\n").await;
        assert_eq!(responses[0]["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let fixture = fixture();
        let server = McpServer::new(fixture.handler);
        let (_client, server_end) = tokio::io::duplex(64);
        let (read_half, _write_half) = tokio::io::split(server_end);
        let mut output = Vec::new();

        // The reader never yields a line, so only the shutdown future ends the loop.
        let result = server
            .serve(
                BufReader::new(read_half),
                &mut output,
                async {},
            )
            .await;

        assert!(result.is_ok());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_ends_the_loop_with_an_error() {
        let fixture = fixture();
        let server = McpServer::new(fixture.handler);
        let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";

        let result = server
            .serve(input.as_bytes(), ClosedPipe, std::future::pending())
            .await;

        match result {
            Err(ServerError::Io(e)) => assert_eq!(e.kind(), ErrorKind::BrokenPipe),
            other => panic!("expected broken pipe, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_failure_ends_the_loop_with_an_error() {
        let fixture = fixture();
        let server = McpServer::new(fixture.handler);
        let mut output = Vec::new();

        let result = server
            .serve(BufReader::new(FailingInput), &mut output, std::future::pending())
            .await;

        match result {
            Err(ServerError::Io(e)) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("expected read error, got {:?}", other),
        }
        assert!(output.is_empty());
    }
}
