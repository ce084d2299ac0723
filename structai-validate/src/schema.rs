//! JSON Schema rendering.
//!
//! Shapes render to a draft 2020-12 style object schema. Declared rules are
//! translated into the matching keywords where one exists (`min=3` on a
//! string becomes `minLength: 3`, `email` becomes `format: email`); rules
//! without a schema equivalent are left out.

use serde_json::{json, Map, Value as JsonValue};

use crate::rules::{Rule, RuleSet};
use crate::shape::{FieldType, Shape};

impl FieldType {
    /// JSON Schema for this type.
    #[must_use]
    pub fn json_schema(&self) -> JsonValue {
        match self {
            FieldType::Any => json!({}),
            FieldType::Bool => json!({"type": "boolean"}),
            FieldType::Int(bounds) => {
                let mut schema = json!({"type": "integer"});
                if bounds.is_narrowed() {
                    schema["minimum"] = json!(bounds.min);
                    schema["maximum"] = json!(bounds.max);
                }
                schema
            }
            FieldType::Float => json!({"type": "number"}),
            FieldType::String => json!({"type": "string"}),
            FieldType::List(item) => json!({"type": "array", "items": item.json_schema()}),
            FieldType::Map(value) => {
                json!({"type": "object", "additionalProperties": value.json_schema()})
            }
            FieldType::Struct(shape) => shape.json_schema(),
            FieldType::Nullable(inner) => nullable(inner.json_schema()),
        }
    }
}

impl Shape {
    /// JSON Schema for this shape.
    #[must_use]
    pub fn json_schema(&self) -> JsonValue {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in self.fields() {
            let mut schema = field.ty().json_schema();
            apply_rules(&mut schema, field.rules());
            if let (Some(description), Some(obj)) = (field.description(), schema.as_object_mut()) {
                obj.insert("description".to_string(), json!(description));
            }
            properties.insert(field.name().to_string(), schema);
            if field.is_required() {
                required.push(json!(field.name()));
            }
        }

        let mut schema = json!({
            "type": "object",
            "title": self.name(),
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });
        if let Some(description) = self.description() {
            schema["description"] = json!(description);
        }
        schema
    }
}

/// Translate `rules` into keywords on `schema`.
pub fn apply_rules(schema: &mut JsonValue, rules: &RuleSet) {
    let kind = base_type(schema).map(str::to_owned);
    let Some(obj) = schema.as_object_mut() else {
        return;
    };

    let (min_key, max_key) = match kind.as_deref() {
        Some("string") => ("minLength", "maxLength"),
        Some("array") => ("minItems", "maxItems"),
        Some("object") => ("minProperties", "maxProperties"),
        _ => ("minimum", "maximum"),
    };
    let numeric = matches!(kind.as_deref(), Some("integer" | "number"));

    for spec in rules {
        match spec.rule() {
            Rule::Min(n) | Rule::Gte(n) => {
                obj.insert(min_key.to_string(), number(*n));
            }
            Rule::Max(n) | Rule::Lte(n) => {
                obj.insert(max_key.to_string(), number(*n));
            }
            Rule::Gt(n) if numeric => {
                obj.insert("exclusiveMinimum".to_string(), number(*n));
            }
            Rule::Lt(n) if numeric => {
                obj.insert("exclusiveMaximum".to_string(), number(*n));
            }
            Rule::Len(n) if !numeric => {
                obj.insert(min_key.to_string(), number(*n));
                obj.insert(max_key.to_string(), number(*n));
            }
            Rule::OneOf(options) => {
                let values: Vec<JsonValue> = options
                    .iter()
                    .map(|o| enum_value(o, kind.as_deref()))
                    .collect();
                obj.insert("enum".to_string(), JsonValue::Array(values));
            }
            Rule::Email => {
                obj.insert("format".to_string(), json!("email"));
            }
            Rule::Url => {
                obj.insert("format".to_string(), json!("uri"));
            }
            Rule::Uuid => {
                obj.insert("format".to_string(), json!("uuid"));
            }
            Rule::Alpha => {
                obj.insert("pattern".to_string(), json!("^[A-Za-z]+$"));
            }
            Rule::AlphaNum => {
                obj.insert("pattern".to_string(), json!("^[A-Za-z0-9]+$"));
            }
            Rule::Numeric if !numeric => {
                obj.insert("pattern".to_string(), json!(r"^[-+]?[0-9]+(?:\.[0-9]+)?$"));
            }
            Rule::Pattern(re) => {
                obj.insert("pattern".to_string(), json!(re.as_str()));
            }
            _ => {}
        }
    }
}

/// Wrap a schema so it also accepts null.
pub(crate) fn nullable(mut schema: JsonValue) -> JsonValue {
    let kind = schema.get("type").and_then(JsonValue::as_str).map(str::to_owned);
    match (kind, schema.as_object_mut()) {
        (Some(kind), Some(obj)) => {
            obj.insert("type".to_string(), json!([kind, "null"]));
            schema
        }
        _ => json!({"anyOf": [schema, {"type": "null"}]}),
    }
}

fn base_type(schema: &JsonValue) -> Option<&str> {
    match schema.get("type")? {
        JsonValue::String(kind) => Some(kind),
        JsonValue::Array(kinds) => kinds
            .iter()
            .filter_map(JsonValue::as_str)
            .find(|kind| *kind != "null"),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn enum_value(option: &str, kind: Option<&str>) -> JsonValue {
    match kind {
        Some("integer") => option.parse::<i64>().map_or_else(|_| json!(option), |i| json!(i)),
        Some("number") => option.parse::<f64>().map_or_else(|_| json!(option), |f| json!(f)),
        Some("boolean") => option.parse::<bool>().map_or_else(|_| json!(option), |b| json!(b)),
        _ => json!(option),
    }
}
