use std::future::IntoFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use futures::future::BoxFuture;
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::providers::{GenerateRequest, ModelClient};
use crate::utils::telemetry::truncate;

use super::errors::GenError;
use super::options::{GenerateOptions, OutputKind};
use super::schema::synthesize_schema;
use super::settings;
use super::template::Template;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Process-wide registry of root generations that have not resolved yet.
/// Append-on-construction, remove-on-resolution; bookkeeping only — nothing
/// in the engine reads it to make decisions.
static PENDING: LazyLock<Mutex<IndexMap<u64, String>>> =
    LazyLock::new(|| Mutex::new(IndexMap::new()));

/// Snapshot of the pending registry: `(id, prompt excerpt)` per root
/// generation constructed but not yet resolved.
pub fn pending_generations() -> Vec<(u64, String)> {
    PENDING
        .lock()
        .unwrap()
        .iter()
        .map(|(id, excerpt)| (*id, excerpt.clone()))
        .collect()
}

/// Another deferred generation whose resolved value is substituted into a
/// prompt before invocation, under the `${<key>}` placeholder.
#[derive(Clone)]
pub struct Dependency {
    pub(crate) target: Deferred,
    pub(crate) key: String,
}

impl Dependency {
    pub fn target(&self) -> &Deferred {
        &self.target
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

type Outcome = Result<Value, GenError>;

struct DeferredInner {
    id: u64,
    prompt: String,
    options: GenerateOptions,
    base_schema: Mutex<Option<Value>>,
    client: Mutex<Option<Arc<dyn ModelClient>>>,
    /// Chain root when this instance was produced by a `field` derivation.
    parent: Option<Deferred>,
    /// Navigation path from the root's resolved value to this value.
    path: Vec<String>,
    accessed: Mutex<IndexSet<String>>,
    deps: Mutex<Vec<Dependency>>,
    cell: OnceCell<Outcome>,
}

/// A not-yet-executed model call.
///
/// Behaves as a future (`.await` / [`resolve`](Deferred::resolve)) and as a
/// navigable handle over its eventual value ([`field`](Deferred::field)).
/// Handles are cheap clones sharing one underlying state; a generation
/// resolves at most once and every later use replays the memoized outcome,
/// errors included.
///
/// Field accesses performed before the first await are folded into the
/// schema requested from the model — touching `.field("summary")` and
/// `.field("isUrgent")` on an un-awaited generation yields one model call
/// whose schema carries exactly those two fields. Resolution is deliberately
/// committed one scheduler tick after the first await so that registrations
/// made in the same synchronous stretch all land first.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<DeferredInner>,
}

impl Deferred {
    fn new_root(template: Template, options: GenerateOptions) -> Self {
        let Template { prompt, deps } = template;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        PENDING
            .lock()
            .unwrap()
            .insert(id, truncate(&prompt, 80).to_string());
        Deferred {
            inner: Arc::new(DeferredInner {
                id,
                prompt,
                options,
                base_schema: Mutex::new(None),
                client: Mutex::new(None),
                parent: None,
                path: Vec::new(),
                accessed: Mutex::new(IndexSet::new()),
                deps: Mutex::new(deps),
                cell: OnceCell::new(),
            }),
        }
    }

    fn new_derived(root: Deferred, path: Vec<String>) -> Self {
        Deferred {
            inner: Arc::new(DeferredInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                prompt: String::new(),
                options: root.inner.options.clone(),
                base_schema: Mutex::new(None),
                client: Mutex::new(None),
                parent: Some(root),
                path,
                accessed: Mutex::new(IndexSet::new()),
                deps: Mutex::new(Vec::new()),
                cell: OnceCell::new(),
            }),
        }
    }

    /// The root of this derivation chain; `self` when not derived.
    pub fn root(&self) -> Deferred {
        match &self.inner.parent {
            Some(root) => root.clone(),
            None => self.clone(),
        }
    }

    /// Whether two handles refer to the same underlying generation.
    pub fn same_generation(&self, other: &Deferred) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Records `name` on the chain root's accessed-property set and returns a
    /// derived generation for that property of the eventual value.
    ///
    /// The derived generation never performs its own model call: resolving it
    /// resolves the root, then navigates the recorded path. Missing keys at
    /// any step navigate to `Value::Null` rather than erroring.
    pub fn field(&self, name: impl Into<String>) -> Deferred {
        let name = name.into();
        let root = self.root();
        root.inner.accessed.lock().unwrap().insert(name.clone());
        let mut path = self.inner.path.clone();
        path.push(name);
        Deferred::new_derived(root, path)
    }

    /// Registers `dep` for substitution into this generation's prompt under
    /// `${<key>}`; a positional `dep_<i>` key is synthesized when none is
    /// given. Registrations made after resolution commits have no effect.
    pub fn add_dependency(&self, dep: &Deferred, key: Option<&str>) {
        let mut deps = self.inner.deps.lock().unwrap();
        let key = match key {
            Some(key) => key.to_string(),
            None => format!("dep_{}", deps.len()),
        };
        deps.push(Dependency {
            target: dep.clone(),
            key,
        });
    }

    /// Attaches a model client to this generation's chain root, overriding
    /// the globally configured one.
    pub fn with_client(self, client: Arc<dyn ModelClient>) -> Self {
        *self.root().inner.client.lock().unwrap() = Some(client);
        self
    }

    /// Declares an explicit output shape on the chain root. Declared fields
    /// take precedence over name-based inference; with no properties touched
    /// the shape is requested verbatim.
    pub fn with_shape(self, shape: Value) -> Self {
        *self.root().inner.base_schema.lock().unwrap() = Some(shape);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.inner.prompt
    }

    pub fn path(&self) -> &[String] {
        &self.inner.path
    }

    pub fn output_kind(&self) -> OutputKind {
        self.inner.options.output_kind
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.inner.options
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.cell.initialized()
    }

    /// The memoized value, when resolution has already succeeded.
    pub fn resolved_value(&self) -> Option<Value> {
        self.inner
            .cell
            .get()
            .and_then(|outcome| outcome.as_ref().ok())
            .cloned()
    }

    /// Property names recorded on this instance so far.
    pub fn accessed_props(&self) -> Vec<String> {
        self.inner
            .accessed
            .lock()
            .unwrap()
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn client(&self) -> Option<Arc<dyn ModelClient>> {
        self.root()
            .inner
            .client
            .lock()
            .unwrap()
            .clone()
            .or_else(settings::default_client)
    }

    /// Resolves this generation, memoizing the outcome.
    ///
    /// Concurrent calls share a single execution; once settled, the cached
    /// value (or error) is returned forever without side effects. Derived
    /// generations resolve their root and navigate; roots resolve their
    /// dependencies in registration order, substitute them into the prompt,
    /// synthesize the schema from the properties touched so far, and make
    /// exactly one collaborator invocation.
    pub async fn resolve(&self) -> Result<Value, GenError> {
        self.inner.cell.get_or_init(|| self.run()).await.clone()
    }

    fn run(&self) -> BoxFuture<'static, Outcome> {
        let this = self.clone();
        Box::pin(async move {
            // Commit point: lets same-turn field touches and dependency
            // registrations land before the schema is frozen.
            tokio::task::yield_now().await;

            if let Some(root) = &this.inner.parent {
                let value = root.resolve().await?;
                return Ok(navigate(&value, &this.inner.path));
            }

            let request = prepare_request(&this).await?;
            let client = this.client().ok_or_else(GenError::unconfigured)?;

            tracing::debug!(
                id = this.inner.id,
                model = %request.model,
                kind = this.inner.options.output_kind.as_str(),
                "invoking model"
            );
            let object = client
                .generate_object(request)
                .await
                .map_err(GenError::provider)?;
            let value = unwrap_output(object, this.inner.options.output_kind);

            PENDING.lock().unwrap().shift_remove(&this.inner.id);
            Ok(value)
        })
    }

    /// Resolves fully, then returns the value's elements: the items of a
    /// sequence, or the whole value as a single element otherwise.
    pub async fn values(&self) -> Result<Vec<Value>, GenError> {
        let value = self.resolve().await?;
        Ok(match value {
            Value::Array(items) => items,
            other => vec![other],
        })
    }

    /// Resolves fully, then visits each element of a sequence value, or the
    /// whole value exactly once otherwise.
    pub async fn for_each<F>(&self, mut visit: F) -> Result<(), GenError>
    where
        F: FnMut(&Value),
    {
        for value in self.values().await? {
            visit(&value);
        }
        Ok(())
    }

    /// Opens the incremental consumption path for this generation's chain
    /// root.
    ///
    /// The stream performs its own dependency resolution and schema
    /// synthesis and does **not** share this object's resolution memo:
    /// consuming the stream and separately awaiting the same object are two
    /// independent collaborator invocations. Pick one consumption mode per
    /// generation unless a duplicate call is acceptable.
    pub fn stream(&self) -> super::stream::GenerationStream {
        super::stream::GenerationStream::new(self.root())
    }
}

impl IntoFuture for Deferred {
    type Output = Result<Value, GenError>;
    type IntoFuture = BoxFuture<'static, Result<Value, GenError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.resolve().await })
    }
}

impl IntoFuture for &Deferred {
    type Output = Result<Value, GenError>;
    type IntoFuture = BoxFuture<'static, Result<Value, GenError>>;

    fn into_future(self) -> Self::IntoFuture {
        let this = self.clone();
        Box::pin(async move { this.resolve().await })
    }
}

/// Builds the collaborator request for a root generation: resolves its
/// dependencies sequentially in registration order, substitutes them into
/// the prompt, and synthesizes the schema from the property-access state at
/// this moment. Shared by the awaited and streaming paths.
pub(crate) async fn prepare_request(root: &Deferred) -> Result<GenerateRequest, GenError> {
    let deps = root.inner.deps.lock().unwrap().clone();
    let mut substitutions: Vec<(String, String)> = Vec::with_capacity(deps.len());
    for dep in deps {
        let value = dep.target.resolve().await?;
        substitutions.push((dep.key, value_to_string(&value)));
    }
    let prompt = substitute(&root.inner.prompt, &substitutions);

    let accessed = root.inner.accessed.lock().unwrap().clone();
    let base = root.inner.base_schema.lock().unwrap().clone();
    let schema = synthesize_schema(&accessed, base.as_ref(), root.inner.options.output_kind);

    let options = &root.inner.options;
    Ok(GenerateRequest {
        model: options.model.clone(),
        prompt,
        system: options.system.clone(),
        temperature: options.temperature,
        max_tokens: options.max_tokens,
        schema: Some(schema),
    })
}

/// Literal textual substitution of `${<key>}` placeholders. Placeholders
/// with no matching substitution stay verbatim in the prompt.
fn substitute(prompt: &str, substitutions: &[(String, String)]) -> String {
    let mut out = prompt.to_string();
    for (key, value) in substitutions {
        let placeholder = format!("${{{key}}}");
        out = out.replace(&placeholder, value);
    }
    out
}

/// String form of a resolved dependency value: strings substitute raw,
/// sequences join their element strings with `", "`, anything else
/// substitutes as compact JSON.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Navigates `path` into a resolved value. Missing keys, out-of-range
/// indices, and non-container hops all yield `Value::Null`.
fn navigate(value: &Value, path: &[String]) -> Value {
    let mut current = value;
    for key in path {
        current = match current {
            Value::Object(map) => match map.get(key) {
                Some(next) => next,
                None => return Value::Null,
            },
            Value::Array(items) => match key.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(next) => next,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}

/// Unwraps the raw structured result according to the output kind. A result
/// missing the expected field degrades to the raw object as-is instead of
/// erroring.
pub(crate) fn unwrap_output(object: Value, kind: OutputKind) -> Value {
    match kind {
        OutputKind::Text => match object.get("text") {
            Some(Value::String(text)) => Value::String(text.clone()),
            _ => degrade(object, kind),
        },
        OutputKind::Boolean => match object.get("answer") {
            Some(Value::Bool(answer)) => Value::Bool(*answer),
            Some(Value::String(answer)) => Value::Bool(answer == "true"),
            _ => degrade(object, kind),
        },
        OutputKind::List | OutputKind::Extract => match object.get("items") {
            Some(Value::Array(items)) => Value::Array(items.clone()),
            _ => degrade(object, kind),
        },
        OutputKind::Lists | OutputKind::Object => object,
    }
}

fn degrade(object: Value, kind: OutputKind) -> Value {
    tracing::debug!(
        kind = kind.as_str(),
        "result missing the field expected by the output kind; returning it as-is"
    );
    object
}

/// Creates a deferred generation from a template and explicit options.
pub fn generate(template: impl Into<Template>, options: GenerateOptions) -> Deferred {
    Deferred::new_root(template.into(), options)
}

fn generate_kind(template: impl Into<Template>, kind: OutputKind) -> Deferred {
    Deferred::new_root(template.into(), settings::default_options().with_kind(kind))
}

/// Deferred plain-text generation; resolves to a string.
pub fn text(template: impl Into<Template>) -> Deferred {
    generate_kind(template, OutputKind::Text)
}

/// Deferred structured generation; the schema is inferred from the
/// properties touched before the first await.
pub fn object(template: impl Into<Template>) -> Deferred {
    generate_kind(template, OutputKind::Object)
}

/// Deferred list generation; resolves to an array of strings.
pub fn list(template: impl Into<Template>) -> Deferred {
    generate_kind(template, OutputKind::List)
}

/// Deferred categorized-lists generation; resolves to a `{categories, data}`
/// object.
pub fn lists(template: impl Into<Template>) -> Deferred {
    generate_kind(template, OutputKind::Lists)
}

/// Deferred yes/no generation; resolves to a boolean.
pub fn boolean(template: impl Into<Template>) -> Deferred {
    generate_kind(template, OutputKind::Boolean)
}

/// Deferred extraction; resolves to the extracted items.
pub fn extract(template: impl Into<Template>) -> Deferred {
    generate_kind(template, OutputKind::Extract)
}

/// Extraction sugar: pulls `what` out of `source`.
pub fn extract_from(source: &str, what: &str) -> Deferred {
    extract(format!("Extract {what} from the following:\n\n{source}"))
}
