use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Coarse classification of a [`GenError`], for matching without digging
/// through source chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenErrorKind {
    /// The structured collaborator invocation rejected.
    Provider,
    /// The incremental collaborator invocation rejected mid-flight.
    Stream,
    /// No model client was configured globally or attached to the generation.
    Unconfigured,
    /// The stream was cancelled through its abort handle before completing.
    Aborted,
}

#[derive(Debug, thiserror::Error)]
enum ErrorRepr {
    /// The collaborator failed; propagated unchanged, never retried here.
    #[error("model call failed")]
    Provider {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("streaming model call failed")]
    Stream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("no model client configured; call `configure` or attach one with `with_client`")]
    Unconfigured,

    #[error("stream aborted before completion")]
    Aborted,
}

/// Failure of a deferred generation.
///
/// A settled generation memoizes its outcome — including this error — and
/// replays it on every later `resolve`/await, so the handle is cheaply
/// clonable and all clones share one underlying representation.
///
/// Malformed unwraps (a `list` result without `items`, a `boolean` result
/// without `answer`) are deliberately **not** errors: the raw object is
/// returned as-is. Likewise an unmatched `${...}` placeholder stays verbatim
/// in the prompt rather than failing the call.
#[derive(Clone)]
pub struct GenError {
    repr: Arc<ErrorRepr>,
}

impl GenError {
    pub(crate) fn provider(source: anyhow::Error) -> Self {
        Self {
            repr: Arc::new(ErrorRepr::Provider {
                source: source.into(),
            }),
        }
    }

    pub(crate) fn stream(source: anyhow::Error) -> Self {
        Self {
            repr: Arc::new(ErrorRepr::Stream {
                source: source.into(),
            }),
        }
    }

    pub(crate) fn unconfigured() -> Self {
        Self {
            repr: Arc::new(ErrorRepr::Unconfigured),
        }
    }

    pub(crate) fn aborted() -> Self {
        Self {
            repr: Arc::new(ErrorRepr::Aborted),
        }
    }

    pub fn kind(&self) -> GenErrorKind {
        match &*self.repr {
            ErrorRepr::Provider { .. } => GenErrorKind::Provider,
            ErrorRepr::Stream { .. } => GenErrorKind::Stream,
            ErrorRepr::Unconfigured => GenErrorKind::Unconfigured,
            ErrorRepr::Aborted => GenErrorKind::Aborted,
        }
    }
}

impl fmt::Debug for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.repr, f)
    }
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.repr, f)
    }
}

impl StdError for GenError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.repr.source()
    }
}
