use serde_json::json;

use lazylm::{DummyClient, Template, TemplatePart, generate, object, prompt, text};

#[test]
fn literals_and_values_inline_immediately() {
    let city = "Lisbon";
    let template = prompt! { "Write a tagline for " {city} "." };

    assert_eq!(template.prompt(), "Write a tagline for Lisbon.");
    assert!(template.dependencies().is_empty());
}

#[test]
fn embedded_generations_become_placeholders() {
    let topic = text("Pick a topic");
    let template = prompt! { "Write about " [topic] " in two sentences." };

    assert_eq!(template.prompt(), "Write about ${dep_0} in two sentences.");
    assert_eq!(template.dependencies().len(), 1);
    assert!(template.dependencies()[0].target().same_generation(&topic));
    assert_eq!(template.dependencies()[0].key(), "dep_0");

    let essay = text(template);
    assert_eq!(essay.prompt(), "Write about ${dep_0} in two sentences.");
}

#[test]
fn dependencies_are_keyed_by_position() {
    let first = text("First");
    let second = text("Second");
    let template = prompt! { [first] " and " [second] };

    assert_eq!(template.prompt(), "${dep_0} and ${dep_1}");
    let keys: Vec<&str> = template.dependencies().iter().map(|d| d.key()).collect();
    assert_eq!(keys, ["dep_0", "dep_1"]);
}

#[test]
fn template_part_type_guard() {
    let dep = text("A dependency");
    let parts = [
        TemplatePart::Text("hi".into()),
        TemplatePart::Dep(dep.clone()),
    ];

    assert!(!parts[0].is_deferred());
    assert!(parts[1].is_deferred());
    assert!(parts[1].as_deferred().unwrap().same_generation(&dep));
}

#[tokio::test]
async fn resolved_dependencies_substitute_into_the_prompt() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "World" }));
    client.enqueue_object(json!({ "text": "ignored" }));

    let who = text("Pick a name").with_client(client.clone());
    let greeting = text(prompt! { "Hello " [who] }).with_client(client.clone());
    greeting.resolve().await.unwrap();

    let prompts: Vec<String> = client.requests().iter().map(|r| r.prompt.clone()).collect();
    assert_eq!(prompts, ["Pick a name", "Hello World"]);
    assert!(!client.last_request().unwrap().prompt.contains("${"));
}

#[tokio::test]
async fn array_dependencies_substitute_as_joined_text() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "items": ["red", "green"] }));
    client.enqueue_object(json!({ "text": "ignored" }));

    let colors = lazylm::list("Two colors").with_client(client.clone());
    let poem = text(prompt! { "A poem about " [colors] }).with_client(client.clone());
    poem.resolve().await.unwrap();

    assert_eq!(client.last_request().unwrap().prompt, "A poem about red, green");
}

#[tokio::test]
async fn unmatched_placeholders_stay_verbatim() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "result": "ok" }));

    // A hand-written placeholder with no registered dependency behind it.
    let deferred = object(Template::from("Echo ${dep_0} back"))
        .with_client(client.clone());
    deferred.resolve().await.unwrap();

    assert_eq!(client.last_request().unwrap().prompt, "Echo ${dep_0} back");
}

#[tokio::test]
async fn manual_dependencies_use_their_explicit_key() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "Ada" }));
    client.enqueue_object(json!({ "result": "ok" }));

    let name = text("A name").with_client(client.clone());
    let bio = object("Write a bio for ${heroine}").with_client(client.clone());
    bio.add_dependency(&name, Some("heroine"));
    bio.resolve().await.unwrap();

    assert_eq!(client.last_request().unwrap().prompt, "Write a bio for Ada");
}

#[tokio::test]
async fn dependencies_resolve_in_registration_order() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "first" }));
    client.enqueue_object(json!({ "text": "second" }));
    client.enqueue_object(json!({ "result": "ok" }));

    let one = text("One").with_client(client.clone());
    let two = text("Two").with_client(client.clone());
    let combined = generate(
        prompt! { [one] " then " [two] },
        lazylm::GenerateOptions::default(),
    )
    .with_client(client.clone());
    combined.resolve().await.unwrap();

    let prompts: Vec<String> = client.requests().iter().map(|r| r.prompt.clone()).collect();
    assert_eq!(prompts, ["One", "Two", "first then second"]);
}

#[tokio::test]
async fn shared_dependencies_are_generated_once() {
    let client = DummyClient::new();
    client.enqueue_object(json!({ "text": "shared" }));
    client.enqueue_object(json!({ "result": "a" }));
    client.enqueue_object(json!({ "result": "b" }));

    let base = text("Base fact").with_client(client.clone());
    let left = object(prompt! { "Left: " [base] }).with_client(client.clone());
    let right = object(prompt! { "Right: " [base] }).with_client(client.clone());
    left.resolve().await.unwrap();
    right.resolve().await.unwrap();

    let prompts: Vec<String> = client.requests().iter().map(|r| r.prompt.clone()).collect();
    assert_eq!(prompts, ["Base fact", "Left: shared", "Right: shared"]);
    assert_eq!(client.object_calls(), 3);
}
