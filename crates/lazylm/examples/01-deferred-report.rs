use anyhow::Result;
use serde_json::json;

use lazylm::{DummyClient, init_tracing, object, prompt, text};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    // Swap the dummy for a real `ModelClient` implementation to go live.
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "quantum error correction" }));
    client.enqueue_object(json!({
        "summary": "Surface codes trade qubits for stability.",
        "keyPoints": ["stabilizers", "logical qubits"],
        "isUrgent": false,
    }));

    let topic = text("Pick a hot physics topic").with_client(client.clone());
    let report = object(prompt! { "Write a short report about " [topic] })
        .with_client(client.clone());

    // Touching fields before the await decides the schema of the single
    // eventual model call.
    let summary = report.field("summary");
    let key_points = report.field("keyPoints");
    let urgent = report.field("isUrgent");

    println!("summary:    {}", summary.resolve().await?);
    println!("key points: {}", key_points.resolve().await?);
    println!("urgent:     {}", urgent.resolve().await?);
    println!("prompt sent: {}", client.last_request().unwrap().prompt);
    Ok(())
}
