use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types usable as structured output of a chat completion.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
/// The generated schema satisfies the constraints of OpenAI-style
/// `json_schema` response formats:
/// 1. `additionalProperties: false` on every object
/// 2. all properties listed in `required`, nullable ones included
/// 3. no `$ref` indirections
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn output_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = match &value {
            serde_json::Value::Object(map) => map.get("definitions").cloned(),
            _ => None,
        };
        inline_refs(&mut value, definitions.as_ref());
        fix_object_schemas(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn fix_object_schemas(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }
            for (_, v) in map.iter_mut() {
                fix_object_schemas(v);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                fix_object_schemas(item);
            }
        }
        _ => {}
    }
}

fn inline_refs(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    let Some(defs) = definitions else { return };

    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(reference)) = map.get("$ref") {
                if let Some(name) = reference.strip_prefix("#/definitions/") {
                    if let Some(resolved) = defs.get(name) {
                        let mut resolved = resolved.clone();
                        inline_refs(&mut resolved, Some(defs));
                        *value = resolved;
                        return;
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                inline_refs(v, Some(defs));
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs(item, Some(defs));
            }
        }
        _ => {}
    }
}
