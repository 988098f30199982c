pub mod dummy;

pub use dummy::*;

use async_trait::async_trait;
use futures::stream::{AbortRegistration, BoxStream};
use serde::Serialize;
use serde_json::Value;

/// One structured model invocation, fully prepared: dependencies are already
/// substituted into `prompt` and `schema` (when present) carries the
/// human-readable shape the caller expects back. Converting that shape into
/// a provider-native validator is the implementor's concern.
#[derive(Clone, Debug, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub schema: Option<Value>,
}

/// Incremental variant of [`GenerateRequest`]. The abort registration, when
/// present, is the caller's cancellation signal; implementors should wire it
/// into their transport.
pub struct StreamRequest {
    pub request: GenerateRequest,
    pub abort: Option<AbortRegistration>,
}

/// One increment of a streaming model call.
#[derive(Clone, Debug, Serialize)]
pub enum StreamEvent {
    /// A raw text chunk.
    TextDelta(String),
    /// A snapshot of the structured value as understood so far.
    PartialObject(Value),
}

/// The model-call collaborator.
///
/// The engine stays agnostic of transports, providers, and model-alias
/// routing; it hands a fully prepared request to whichever implementation is
/// configured and unwraps what comes back. Errors are propagated to the
/// awaiting caller unchanged — retry policy belongs to the implementor.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Executes a structured generation and returns the raw object.
    async fn generate_object(&self, request: GenerateRequest) -> anyhow::Result<Value>;

    /// Opens an incremental generation. The returned stream yields text
    /// deltas and/or partial-object snapshots until the call completes.
    async fn stream_generate(
        &self,
        request: StreamRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<StreamEvent>>>;
}

#[async_trait]
impl<T: ModelClient + ?Sized> ModelClient for std::sync::Arc<T> {
    async fn generate_object(&self, request: GenerateRequest) -> anyhow::Result<Value> {
        (**self).generate_object(request).await
    }

    async fn stream_generate(
        &self,
        request: StreamRequest,
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<StreamEvent>>> {
        (**self).stream_generate(request).await
    }
}
