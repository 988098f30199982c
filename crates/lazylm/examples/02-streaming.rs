use anyhow::Result;
use futures::StreamExt;

use lazylm::{DummyClient, ScriptStep, init_tracing, text};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let client = DummyClient::new();
    client.enqueue_stream(vec![
        ScriptStep::text("Deferred "),
        ScriptStep::text("generation, "),
        ScriptStep::text("incrementally."),
    ]);

    let stream = text("Describe this library in five words")
        .with_client(client.clone())
        .stream();

    let mut chunks = stream.text_stream();
    while let Some(chunk) = chunks.next().await {
        print!("{}", chunk?);
    }
    println!();

    // Replays from the buffer; the model was only called once.
    println!("full text: {}", stream.result().await?);
    println!("stream calls: {}", client.stream_calls());
    Ok(())
}
