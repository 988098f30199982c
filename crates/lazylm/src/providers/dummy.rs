use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{Abortable, BoxStream};
use serde_json::{Value, json};

use super::{GenerateRequest, ModelClient, StreamEvent, StreamRequest};

/// One scripted step of a [`DummyClient`] stream.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Event(StreamEvent),
    Fail(String),
}

impl ScriptStep {
    pub fn text(chunk: impl Into<String>) -> Self {
        ScriptStep::Event(StreamEvent::TextDelta(chunk.into()))
    }

    pub fn partial(snapshot: Value) -> Self {
        ScriptStep::Event(StreamEvent::PartialObject(snapshot))
    }

    pub fn fail(message: impl Into<String>) -> Self {
        ScriptStep::Fail(message.into())
    }
}

/// In-memory model client for deterministic tests and examples.
///
/// Structured responses and stream scripts are consumed queue-style, every
/// request is captured for inspection, and invocation counters let tests
/// assert how many times the collaborator actually ran. With nothing
/// enqueued it answers `{"result": "dummy response"}` (or a single
/// `"dummy response"` chunk when streaming).
#[derive(Default)]
pub struct DummyClient {
    objects: Mutex<VecDeque<Value>>,
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    chunk_delay: Mutex<Option<Duration>>,
    object_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl DummyClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enqueues the raw object returned by the next `generate_object` call.
    pub fn enqueue_object(&self, object: Value) {
        self.objects.lock().unwrap().push_back(object);
    }

    /// Enqueues the script played by the next `stream_generate` call.
    pub fn enqueue_stream(&self, steps: Vec<ScriptStep>) {
        self.scripts.lock().unwrap().push_back(steps);
    }

    /// Inserts a pause before each scripted stream step, so tests can
    /// interleave with an in-flight stream.
    pub fn set_chunk_delay(&self, delay: Duration) {
        *self.chunk_delay.lock().unwrap() = Some(delay);
    }

    pub fn object_calls(&self) -> usize {
        self.object_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Every request seen so far, structured and streaming alike, in call
    /// order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ModelClient for DummyClient {
    async fn generate_object(&self, request: GenerateRequest) -> anyhow::Result<Value> {
        self.requests.lock().unwrap().push(request);
        self.object_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.objects.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| json!({ "result": "dummy response" })))
    }

    async fn stream_generate(
        &self,
        request: StreamRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<StreamEvent>>> {
        self.requests.lock().unwrap().push(request.request);
        self.stream_calls.fetch_add(1, Ordering::SeqCst);

        let steps = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![ScriptStep::text("dummy response")]);
        let delay = *self.chunk_delay.lock().unwrap();

        let events = futures::stream::iter(steps).then(move |step| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match step {
                ScriptStep::Event(event) => Ok(event),
                ScriptStep::Fail(message) => Err(anyhow::anyhow!(message)),
            }
        });

        Ok(match request.abort {
            Some(registration) => Abortable::new(events, registration).boxed(),
            None => events.boxed(),
        })
    }
}
