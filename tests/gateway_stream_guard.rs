use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use serde_json::{Value, json};
use uni_gateway::gateway::{
    GatewayError, NO_DATA_RETURNED, StreamFragment, guard_stream, guard_stream_default,
};

fn sse(value: &Value) -> Bytes {
    Bytes::from(format!("data: {value}\n\n"))
}

#[tokio::test]
async fn byte_stream_from_upstream_is_forwarded_intact() {
    let chunks = vec![
        sse(&json!({"choices": [{"delta": {"content": "Hel"}}]})),
        sse(&json!({"choices": [{"delta": {"content": "lo"}}]})),
        Bytes::from_static(b"data: [DONE]\n\n"),
    ];
    let expected: Vec<String> = chunks
        .iter()
        .map(|chunk| String::from_utf8(chunk.to_vec()).unwrap())
        .collect();

    let guarded = guard_stream_default(stream::iter(chunks))
        .await
        .expect("clean stream");
    let forwarded: Vec<String> = guarded.collect().await;
    assert_eq!(forwarded, expected);
}

#[tokio::test]
async fn upstream_error_event_becomes_integrity_error() {
    let chunks = vec![sse(&json!({
        "error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}
    }))];

    let err = guard_stream(stream::iter(chunks), 429).await.unwrap_err();
    match err {
        GatewayError::StreamIntegrity { status, detail } => {
            assert_eq!(status, 429);
            assert!(detail.contains("Rate limit reached"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn structured_events_are_rendered_as_sse_lines() {
    let events = vec![
        StreamFragment::Structured(json!({"id": "chatcmpl-1", "choices": []})),
        StreamFragment::Text("data: [DONE]\n\n".to_string()),
    ];
    let guarded = guard_stream_default(stream::iter(events))
        .await
        .expect("clean stream");
    let forwarded: Vec<String> = guarded.collect().await;

    let first = forwarded[0]
        .strip_prefix("data: ")
        .expect("sse prefix")
        .trim_end();
    let payload: Value = serde_json::from_str(first).expect("json");
    assert_eq!(payload, json!({"id": "chatcmpl-1", "choices": []}));
    assert_eq!(forwarded[1], "data: [DONE]\n\n");
}

#[tokio::test]
async fn upstream_that_closes_immediately_is_reported_as_empty() {
    let err = guard_stream(stream::empty::<Bytes>(), 503).await.unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert_eq!(err.to_string(), NO_DATA_RETURNED);
}
