use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};

use lazylm::{DummyClient, GenErrorKind, ScriptStep, list, object, prompt, text};

#[tokio::test]
async fn text_result_is_the_concatenation_of_chunks() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![ScriptStep::text("Hel"), ScriptStep::text("lo")]);

    let stream = text("Say hello").with_client(client.clone()).stream();
    assert_eq!(stream.result().await.unwrap(), json!("Hello"));
    assert_eq!(client.stream_calls(), 1);
}

#[tokio::test]
async fn text_chunks_arrive_in_order() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![ScriptStep::text("Hel"), ScriptStep::text("lo")]);

    let stream = text("Say hello").with_client(client.clone()).stream();
    let chunks: Vec<String> = stream
        .text_stream()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    assert_eq!(chunks, ["Hel", "lo"]);
}

#[tokio::test]
async fn replaying_a_stream_does_not_reinvoke_the_model() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![ScriptStep::text("Hel"), ScriptStep::text("lo")]);

    let stream = text("Say hello").with_client(client.clone()).stream();
    let first: Vec<String> = stream.text_stream().map(|c| c.unwrap()).collect().await;
    let second: Vec<String> = stream.text_stream().map(|c| c.unwrap()).collect().await;

    assert_eq!(first, second);
    assert_eq!(client.stream_calls(), 1);
}

#[tokio::test]
async fn partial_stream_yields_snapshots_for_object_kinds() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![
        ScriptStep::partial(json!({ "summary": "dr" })),
        ScriptStep::partial(json!({ "summary": "draft" })),
    ]);

    let stream = object("Summarize").with_client(client.clone()).stream();
    let partials: Vec<Value> = stream
        .partial_stream()
        .map(|partial| partial.unwrap())
        .collect()
        .await;

    assert_eq!(
        partials,
        [json!({ "summary": "dr" }), json!({ "summary": "draft" })]
    );
    assert_eq!(stream.result().await.unwrap(), json!({ "summary": "draft" }));
}

#[tokio::test]
async fn list_streams_yield_newly_completed_items() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![
        ScriptStep::partial(json!({ "items": ["a"] })),
        ScriptStep::partial(json!({ "items": ["a", "b"] })),
        ScriptStep::partial(json!({ "items": ["a", "b", "c"] })),
    ]);

    let stream = list("Three things").with_client(client.clone()).stream();
    let items: Vec<Value> = stream.partial_stream().map(|item| item.unwrap()).collect().await;

    assert_eq!(items, [json!("a"), json!("b"), json!("c")]);
    assert_eq!(stream.result().await.unwrap(), json!(["a", "b", "c"]));
}

#[tokio::test]
async fn stream_errors_reject_result_and_reraise_on_iteration() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![ScriptStep::text("par"), ScriptStep::fail("boom")]);

    let stream = text("Doomed").with_client(client.clone()).stream();
    assert_eq!(stream.result().await.unwrap_err().kind(), GenErrorKind::Stream);

    // Replays the seen chunk, then re-raises the same failure; no re-invoke.
    let replay: Vec<Result<String, _>> = stream.text_stream().collect().await;
    assert_eq!(replay.len(), 2);
    assert_eq!(replay[0].as_ref().unwrap(), "par");
    assert_eq!(
        replay[1].as_ref().unwrap_err().kind(),
        GenErrorKind::Stream
    );
    assert_eq!(client.stream_calls(), 1);
}

#[tokio::test]
async fn streaming_and_awaiting_are_independent_executions() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "awaited" }));
    client.enqueue_stream(vec![ScriptStep::text("streamed")]);

    let deferred = text("Twice").with_client(client.clone());
    let awaited = deferred.resolve().await.unwrap();
    let streamed = deferred.stream().result().await.unwrap();

    assert_eq!(awaited, json!("awaited"));
    assert_eq!(streamed, json!("streamed"));
    assert_eq!(client.object_calls(), 1);
    assert_eq!(client.stream_calls(), 1);
}

#[tokio::test]
async fn stream_requests_substitute_dependencies_too() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "World" }));
    client.enqueue_stream(vec![ScriptStep::text("Hello World")]);

    let who = text("Pick a name").with_client(client.clone());
    let greeting = text(prompt! { "Hello " [who] }).with_client(client.clone());
    greeting.stream().result().await.unwrap();

    assert_eq!(client.last_request().unwrap().prompt, "Hello World");
}

#[tokio::test]
async fn text_stream_requests_carry_no_schema() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![ScriptStep::text("hi")]);

    text("Say hi").with_client(client.clone()).stream().result().await.unwrap();
    assert_eq!(client.last_request().unwrap().schema, None);
}

#[tokio::test]
async fn object_stream_requests_carry_the_synthesized_schema() {
    let client = DummyClient::new();
    client.enqueue_stream(vec![ScriptStep::partial(json!({ "summary": "s" }))]);

    let report = object("Report").with_client(client.clone());
    let _summary = report.field("summary");
    report.stream().result().await.unwrap();

    assert_eq!(
        client.last_request().unwrap().schema,
        Some(json!({ "summary": "string" }))
    );
}

#[tokio::test]
async fn aborting_ends_the_stream_with_an_abort_error() {
    let client = DummyClient::new();
    client.set_chunk_delay(Duration::from_millis(50));
    client.enqueue_stream(vec![
        ScriptStep::text("one"),
        ScriptStep::text("two"),
        ScriptStep::text("three"),
    ]);

    let stream = text("Slow").with_client(client.clone()).stream();
    let mut chunks = stream.text_stream();
    let first = chunks.next().await.unwrap().unwrap();
    assert_eq!(first, "one");

    stream.abort();
    let error = stream.result().await.unwrap_err();
    assert_eq!(error.kind(), GenErrorKind::Aborted);
}
