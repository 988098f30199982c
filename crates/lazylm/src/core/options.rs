use bon::Builder;

/// Selects how the raw structured result of a model call is unwrapped into
/// the caller-visible value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// Unwraps `{text}` into a plain string.
    Text,
    /// Returns the structured object untouched.
    #[default]
    Object,
    /// Unwraps `{items}` into an array.
    List,
    /// Categorized lists; returns the `{categories, data}` object untouched.
    Lists,
    /// Coerces `{answer}` into a boolean.
    Boolean,
    /// Extraction variant of [`OutputKind::List`]; unwraps `{items}`.
    Extract,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Text => "text",
            OutputKind::Object => "object",
            OutputKind::List => "list",
            OutputKind::Lists => "lists",
            OutputKind::Boolean => "boolean",
            OutputKind::Extract => "extract",
        }
    }
}

/// Inference settings applied to a single deferred generation.
///
/// Derived generations share the options of the object they were derived
/// from. Unset optional fields are omitted from the collaborator request.
#[derive(Debug, Clone, Builder)]
pub struct GenerateOptions {
    /// Model identifier handed to the collaborator verbatim; alias routing is
    /// the collaborator's concern.
    #[builder(default = "gpt-4o-mini".to_string())]
    pub model: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Completion token ceiling.
    pub max_tokens: Option<u32>,
    /// System prompt sent alongside the generation prompt.
    pub system: Option<String>,
    /// Result unwrapping mode.
    #[builder(default)]
    pub output_kind: OutputKind,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions::builder().build()
    }
}

impl GenerateOptions {
    /// Copy of these options with a different [`OutputKind`].
    pub fn with_kind(mut self, kind: OutputKind) -> Self {
        self.output_kind = kind;
        self
    }
}
