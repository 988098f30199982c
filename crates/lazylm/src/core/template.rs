use super::deferred::{Deferred, Dependency};

/// One fragment of a prompt template, in source order.
#[derive(Clone)]
pub enum TemplatePart {
    /// Literal prompt text.
    Text(String),
    /// An interpolated value, already rendered to its string form.
    Value(String),
    /// An embedded deferred generation whose eventual value is substituted
    /// into the prompt at resolution time.
    Dep(Deferred),
}

impl TemplatePart {
    /// Whether this part embeds a deferred generation.
    pub fn is_deferred(&self) -> bool {
        matches!(self, TemplatePart::Dep(_))
    }

    pub fn as_deferred(&self) -> Option<&Deferred> {
        match self {
            TemplatePart::Dep(dep) => Some(dep),
            _ => None,
        }
    }
}

/// A parsed prompt: flat text with `${dep_<i>}` placeholders plus the ordered
/// dependency list those placeholders refer to.
#[derive(Clone, Default)]
pub struct Template {
    pub(crate) prompt: String,
    pub(crate) deps: Vec<Dependency>,
}

impl Template {
    /// Concatenates the parts in order. Text and value parts are inlined
    /// immediately; each embedded deferred generation is registered as a
    /// dependency at its position `i` and replaced with a `${dep_<i>}`
    /// placeholder token.
    pub fn from_parts(parts: Vec<TemplatePart>) -> Self {
        let mut prompt = String::new();
        let mut deps: Vec<Dependency> = Vec::new();
        for part in parts {
            match part {
                TemplatePart::Text(text) | TemplatePart::Value(text) => prompt.push_str(&text),
                TemplatePart::Dep(target) => {
                    let key = format!("dep_{}", deps.len());
                    prompt.push_str("${");
                    prompt.push_str(&key);
                    prompt.push('}');
                    deps.push(Dependency { target, key });
                }
            }
        }
        Self { prompt, deps }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }
}

impl From<&str> for Template {
    fn from(prompt: &str) -> Self {
        Template {
            prompt: prompt.to_string(),
            deps: Vec::new(),
        }
    }
}

impl From<String> for Template {
    fn from(prompt: String) -> Self {
        Template {
            prompt,
            deps: Vec::new(),
        }
    }
}
