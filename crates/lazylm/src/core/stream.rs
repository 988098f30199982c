use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use futures::stream::{AbortHandle, BoxStream};
use serde_json::Value;
use tokio::sync::Notify;

use crate::providers::{StreamEvent, StreamRequest};

use super::deferred::{Deferred, prepare_request, unwrap_output};
use super::errors::GenError;
use super::options::OutputKind;

type Outcome = Result<Value, GenError>;

/// Next action decided while the notify registration is live, applied after
/// it drops so the shared `inner` can move into the unfold state.
enum TextStep {
    Yield(String),
    Done,
    Err(GenError),
    Continue,
}

enum PartialStep {
    Item,
    Done,
    Err(GenError),
    Continue,
}

struct StreamInner {
    target: Deferred,
    started: Mutex<bool>,
    buffer: Mutex<Vec<StreamEvent>>,
    finished: Mutex<Option<Outcome>>,
    notify: Notify,
    abort: Mutex<Option<AbortHandle>>,
    aborted: AtomicBool,
}

/// Incremental consumption path for a deferred generation.
///
/// Constructed by [`Deferred::stream`]; always targets the chain root. The
/// underlying incremental collaborator call starts when the first surface is
/// polled — [`text_stream`](GenerationStream::text_stream),
/// [`partial_stream`](GenerationStream::partial_stream), or
/// [`result`](GenerationStream::result) — and every surface replays
/// already-seen chunks from an internal buffer, so consuming twice never
/// re-invokes the collaborator. It does **not** share the root's resolution
/// memo: streaming and separately awaiting the same generation are two
/// independent executions.
///
/// A mid-stream failure settles [`result`](GenerationStream::result)
/// rejected and is re-raised at the tail of every later iteration of either
/// stream surface.
#[derive(Clone)]
pub struct GenerationStream {
    inner: Arc<StreamInner>,
}

impl GenerationStream {
    pub(crate) fn new(target: Deferred) -> Self {
        GenerationStream {
            inner: Arc::new(StreamInner {
                target,
                started: Mutex::new(false),
                buffer: Mutex::new(Vec::new()),
                finished: Mutex::new(None),
                notify: Notify::new(),
                abort: Mutex::new(None),
                aborted: AtomicBool::new(false),
            }),
        }
    }

    /// Cancels the in-flight incremental call. Chunks already buffered keep
    /// replaying; the terminal outcome becomes an abort error.
    pub fn abort(&self) {
        self.inner.aborted.store(true, Ordering::SeqCst);
        if let Some(handle) = self.inner.abort.lock().unwrap().as_ref() {
            handle.abort();
        }
        self.inner.notify.notify_waiters();
    }

    /// Lazy sequence of raw text chunks. For non-text kinds this carries
    /// whatever text deltas the collaborator emits alongside its partials.
    pub fn text_stream(&self) -> BoxStream<'static, Result<String, GenError>> {
        let inner = Arc::clone(&self.inner);
        futures::stream::unfold(
            (inner, 0usize, false),
            |(inner, mut index, errored)| async move {
                if errored {
                    return None;
                }
                loop {
                    ensure_started(&inner);
                    let step = {
                        let notified = inner.notify.notified();
                        tokio::pin!(notified);
                        notified.as_mut().enable();

                        let mut yielded = None;
                        {
                            let buffer = inner.buffer.lock().unwrap();
                            while index < buffer.len() {
                                let event = buffer[index].clone();
                                index += 1;
                                if let StreamEvent::TextDelta(chunk) = event {
                                    yielded = Some(chunk);
                                    break;
                                }
                            }
                        }

                        if let Some(chunk) = yielded {
                            TextStep::Yield(chunk)
                        } else {
                            let finished = inner.finished.lock().unwrap().clone();
                            match finished {
                                Some(Ok(_)) => TextStep::Done,
                                Some(Err(error)) => TextStep::Err(error),
                                None => {
                                    notified.await;
                                    TextStep::Continue
                                }
                            }
                        }
                    };
                    match step {
                        TextStep::Yield(chunk) => {
                            return Some((Ok(chunk), (inner, index, false)));
                        }
                        TextStep::Done => return None,
                        TextStep::Err(error) => {
                            return Some((Err(error), (inner, index, true)));
                        }
                        TextStep::Continue => {}
                    }
                }
            },
        )
        .boxed()
    }

    /// Lazy sequence of partial structured values.
    ///
    /// For [`OutputKind::List`] this yields only the newly completed items of
    /// the growing partial array, by diffing array length between successive
    /// partials; for other object kinds it yields successive snapshots.
    pub fn partial_stream(&self) -> BoxStream<'static, Result<Value, GenError>> {
        let list_kind = matches!(
            self.inner.target.output_kind(),
            OutputKind::List | OutputKind::Extract
        );
        let inner = Arc::clone(&self.inner);
        futures::stream::unfold(
            (inner, 0usize, Vec::<Value>::new(), false),
            move |(inner, mut index, mut queued, errored)| async move {
                if errored {
                    return None;
                }
                loop {
                    if let Some(item) = pop_front(&mut queued) {
                        return Some((Ok(item), (inner, index, queued, false)));
                    }

                    ensure_started(&inner);
                    let step = {
                        let notified = inner.notify.notified();
                        tokio::pin!(notified);
                        notified.as_mut().enable();

                        {
                            let buffer = inner.buffer.lock().unwrap();
                            while index < buffer.len() {
                                let event = buffer[index].clone();
                                index += 1;
                                if let StreamEvent::PartialObject(partial) = event {
                                    if list_kind {
                                        // Seen-count is the number of items already
                                        // queued or yielded across prior partials.
                                        queued.extend(new_items(&buffer[..index], &partial));
                                    } else {
                                        queued.push(partial);
                                    }
                                    break;
                                }
                            }
                        }

                        if !queued.is_empty() {
                            PartialStep::Item
                        } else {
                            let finished = inner.finished.lock().unwrap().clone();
                            if let Some(outcome) = finished {
                                let drained = index >= inner.buffer.lock().unwrap().len();
                                if drained {
                                    match outcome {
                                        Ok(_) => PartialStep::Done,
                                        Err(error) => PartialStep::Err(error),
                                    }
                                } else {
                                    PartialStep::Continue
                                }
                            } else {
                                notified.await;
                                PartialStep::Continue
                            }
                        }
                    };
                    match step {
                        PartialStep::Item => {
                            let item = pop_front(&mut queued).unwrap();
                            return Some((Ok(item), (inner, index, queued, false)));
                        }
                        PartialStep::Done => return None,
                        PartialStep::Err(error) => {
                            return Some((Err(error), (inner, index, queued, true)));
                        }
                        PartialStep::Continue => {}
                    }
                }
            },
        )
        .boxed()
    }

    /// Settles to the same fully-unwrapped value the non-streaming path
    /// would produce: the concatenation of all chunks for text generations,
    /// the per-kind unwrap of the last partial snapshot otherwise.
    pub async fn result(&self) -> Result<Value, GenError> {
        loop {
            ensure_started(&self.inner);
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let finished = self.inner.finished.lock().unwrap().clone();
            if let Some(outcome) = finished {
                return outcome;
            }
            notified.await;
        }
    }
}

fn pop_front(queued: &mut Vec<Value>) -> Option<Value> {
    if queued.is_empty() {
        None
    } else {
        Some(queued.remove(0))
    }
}

/// Items of `partial`'s array that extend what previous partials in the
/// buffer already carried.
fn new_items(seen_events: &[StreamEvent], partial: &Value) -> Vec<Value> {
    let prior_len = seen_events[..seen_events.len().saturating_sub(1)]
        .iter()
        .filter_map(|event| match event {
            StreamEvent::PartialObject(previous) => partial_items(previous).map(<[Value]>::len),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    match partial_items(partial) {
        Some(items) if items.len() > prior_len => items[prior_len..].to_vec(),
        _ => Vec::new(),
    }
}

fn partial_items(partial: &Value) -> Option<&[Value]> {
    match partial {
        Value::Array(items) => Some(items),
        Value::Object(map) => match map.get("items") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn ensure_started(inner: &Arc<StreamInner>) {
    let mut started = inner.started.lock().unwrap();
    if *started {
        return;
    }
    *started = true;
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let outcome = drive(&inner).await;
        *inner.finished.lock().unwrap() = Some(outcome);
        inner.notify.notify_waiters();
    });
}

/// Runs the incremental collaborator call to completion, buffering every
/// event for replay and computing the terminal unwrapped value.
async fn drive(inner: &Arc<StreamInner>) -> Outcome {
    let kind = inner.target.output_kind();
    let mut request = prepare_request(&inner.target).await?;
    if kind == OutputKind::Text {
        // Raw text streaming; no structured shape to request.
        request.schema = None;
    }

    if inner.aborted.load(Ordering::SeqCst) {
        return Err(GenError::aborted());
    }
    let (handle, registration) = AbortHandle::new_pair();
    *inner.abort.lock().unwrap() = Some(handle);

    let client = inner.target.client().ok_or_else(GenError::unconfigured)?;
    tracing::debug!(model = %request.model, kind = kind.as_str(), "opening model stream");
    let mut events = client
        .stream_generate(StreamRequest {
            request,
            abort: Some(registration),
        })
        .await
        .map_err(GenError::stream)?;

    let mut text_acc = String::new();
    let mut last_partial: Option<Value> = None;
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                match &event {
                    StreamEvent::TextDelta(chunk) => text_acc.push_str(chunk),
                    StreamEvent::PartialObject(partial) => last_partial = Some(partial.clone()),
                }
                inner.buffer.lock().unwrap().push(event);
                inner.notify.notify_waiters();
            }
            Err(error) => return Err(GenError::stream(error)),
        }
    }

    if inner.aborted.load(Ordering::SeqCst) {
        return Err(GenError::aborted());
    }
    match kind {
        OutputKind::Text => Ok(Value::String(text_acc)),
        _ => Ok(unwrap_output(last_partial.unwrap_or(Value::Null), kind)),
    }
}
