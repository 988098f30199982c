use indexmap::IndexSet;
use serde_json::{Map, Value, json};

use super::options::OutputKind;

/// Builds the human-readable shape requested from the model for one
/// invocation.
///
/// Pure and deterministic: the output depends only on the accessed property
/// names, the optional declared base shape, and the output kind. Conversion
/// of the shape into a provider-native validator is the collaborator's job.
///
/// Precedence:
/// 1. No properties were touched and a non-empty base shape exists — the base
///    shape is used verbatim.
/// 2. No properties were touched and no base shape — a default shape derived
///    from the output kind.
/// 3. Otherwise one flat object shape with a field per touched property: a
///    base-shape declaration wins, else the field type is guessed from the
///    property name.
pub fn synthesize_schema(
    accessed: &IndexSet<String>,
    base: Option<&Value>,
    kind: OutputKind,
) -> Value {
    let base_fields = base.and_then(Value::as_object).filter(|map| !map.is_empty());

    if accessed.is_empty() {
        if let Some(fields) = base_fields {
            return Value::Object(fields.clone());
        }
        return default_shape(kind);
    }

    let mut fields = Map::new();
    for name in accessed {
        let declared = base_fields.and_then(|map| map.get(name.as_str()));
        let shape = match declared {
            Some(decl) => decl.clone(),
            None => classify(name),
        };
        fields.insert(name.clone(), shape);
    }
    Value::Object(fields)
}

fn default_shape(kind: OutputKind) -> Value {
    match kind {
        OutputKind::List | OutputKind::Extract => json!({ "items": ["string"] }),
        OutputKind::Lists => json!({ "categories": ["string"], "data": {} }),
        OutputKind::Boolean => json!({ "answer": "true or false" }),
        OutputKind::Text => json!({ "text": "string" }),
        OutputKind::Object => json!({ "result": "string" }),
    }
}

/// Name-pattern heuristic for an inferred field. Checked in order: plural or
/// collection-flavored names become string arrays, predicate-flavored names
/// become booleans, quantity-flavored names become numbers, everything else
/// a string.
fn classify(name: &str) -> Value {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with('s')
        || lower.contains("list")
        || lower.contains("items")
        || lower.contains("array")
    {
        json!(["string"])
    } else if lower.contains("is")
        || lower.contains("has")
        || lower.contains("can")
        || lower.contains("should")
    {
        json!("true or false")
    } else if lower.contains("count")
        || lower.contains("number")
        || lower.contains("total")
        || lower.contains("amount")
    {
        json!("number")
    } else {
        json!("string")
    }
}
