//! `$ref` parsing and rebasing

use serde_json::Value;

/// A parsed `<schema-id>#<json-pointer>` reference.
///
/// `schema_id` is `None` for document-local references (`#/defs/node`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference<'a> {
    pub schema_id: Option<&'a str>,
    pub pointer: &'a str,
}

impl<'a> Reference<'a> {
    pub fn parse(reference: &'a str) -> Self {
        let (id, pointer) = reference.split_once('#').unwrap_or((reference, ""));
        Self {
            schema_id: (!id.is_empty()).then_some(id),
            pointer,
        }
    }
}

/// Resolve a possibly relative schema id against the id of the schema containing it.
///
/// Returns the input unchanged when it is already absolute or the base is
/// not a URL.
pub fn absolutize(schema_id: &str, base: Option<&str>) -> String {
    if url::Url::parse(schema_id).is_ok() {
        return schema_id.to_string();
    }
    base.and_then(|b| url::Url::parse(b).ok())
        .and_then(|b| b.join(schema_id).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| schema_id.to_string())
}

/// Keywords whose values are instance data, not subschemas
const DATA_KEYWORDS: &[&str] = &["const", "enum", "examples", "default"];

/// Keywords whose values map names to subschemas
const SCHEMA_MAPS: &[&str] = &[
    "properties",
    "patternProperties",
    "dependentSchemas",
    "$defs",
    "defs",
    "definitions",
];

/// What an object member holds, as seen by a walk over schema keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchemaMember {
    /// Instance data (`const`, `enum`, ...); never holds live `$ref`s
    Data,
    /// A subschema, or a keyword value that may contain subschemas
    Schema,
    /// A name-to-subschema map such as `properties`
    SchemaMap,
}

impl SchemaMember {
    /// Classify `key` of an object. Inside a name-to-subschema map every
    /// key is a name, so `default` or `enum` there is still a schema.
    pub(crate) fn classify(key: &str, in_schema_map: bool) -> Self {
        if in_schema_map {
            Self::Schema
        } else if DATA_KEYWORDS.contains(&key) {
            Self::Data
        } else if SCHEMA_MAPS.contains(&key) {
            Self::SchemaMap
        } else {
            Self::Schema
        }
    }
}

/// Rewrite every `$ref` inside `value` so it no longer depends on the
/// document it was taken from.
pub fn rebase_refs(value: &mut Value, schema_id: &str) {
    rebase_within(value, schema_id, false);
}

fn rebase_within(value: &mut Value, schema_id: &str, in_schema_map: bool) {
    match value {
        Value::Object(obj) => {
            if !in_schema_map {
                if let Some(Value::String(reference)) = obj.get_mut("$ref") {
                    if let Some(rebased) = rebase(reference, schema_id) {
                        *reference = rebased;
                    }
                }
            }
            for (key, child) in obj.iter_mut() {
                match SchemaMember::classify(key, in_schema_map) {
                    SchemaMember::Data => {}
                    SchemaMember::Schema => rebase_within(child, schema_id, false),
                    SchemaMember::SchemaMap => rebase_within(child, schema_id, true),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                rebase_within(item, schema_id, false);
            }
        }
        _ => {}
    }
}

fn rebase(reference: &str, schema_id: &str) -> Option<String> {
    if reference.starts_with('#') {
        return Some(format!("{schema_id}{reference}"));
    }
    let parsed = Reference::parse(reference);
    let id = parsed.schema_id?;
    let absolute = absolutize(id, Some(schema_id));
    if absolute == id {
        return None;
    }
    Some(if reference.contains('#') {
        format!("{absolute}#{}", parsed.pointer)
    } else {
        absolute
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reference_forms() {
        assert_eq!(
            Reference::parse("https://x/core.json#/defs/node"),
            Reference { schema_id: Some("https://x/core.json"), pointer: "/defs/node" }
        );
        assert_eq!(
            Reference::parse("#/defs/node"),
            Reference { schema_id: None, pointer: "/defs/node" }
        );
        assert_eq!(
            Reference::parse("https://x/core.json"),
            Reference { schema_id: Some("https://x/core.json"), pointer: "" }
        );
    }

    #[test]
    fn test_absolutize_relative_ids() {
        assert_eq!(
            absolutize("interface.json", Some("https://calm.finos.org/release/1.1/meta/core.json")),
            "https://calm.finos.org/release/1.1/meta/interface.json"
        );
        assert_eq!(absolutize("https://a/b.json", Some("https://c/d.json")), "https://a/b.json");
        assert_eq!(absolutize("b.json", Some("not-a-url")), "b.json");
        assert_eq!(absolutize("b.json", None), "b.json");
    }

    #[test]
    fn test_rebase_local_and_relative_refs() {
        let mut value = json!({
            "properties": {
                "a": { "$ref": "#/defs/a" },
                "b": { "$ref": "interface.json#/defs/b" },
                "c": { "$ref": "https://other/x.json" },
                "d": { "const": { "$ref": "#/not-a-schema" } }
            }
        });
        rebase_refs(&mut value, "https://calm/meta/core.json");
        assert_eq!(value["properties"]["a"]["$ref"], "https://calm/meta/core.json#/defs/a");
        assert_eq!(value["properties"]["b"]["$ref"], "https://calm/meta/interface.json#/defs/b");
        assert_eq!(value["properties"]["c"]["$ref"], "https://other/x.json");
        assert_eq!(value["properties"]["d"]["const"]["$ref"], "#/not-a-schema");
    }

    #[test]
    fn test_properties_named_like_data_keywords_are_rebased() {
        let mut value = json!({
            "properties": {
                "default": { "$ref": "#/defs/a" },
                "enum": { "properties": { "$ref": { "type": "string" } } },
                "$ref": { "$ref": "#/defs/b" }
            },
            "default": { "$ref": "#/instance-data" }
        });
        rebase_refs(&mut value, "https://calm/meta/core.json");
        assert_eq!(value["properties"]["default"]["$ref"], "https://calm/meta/core.json#/defs/a");
        assert_eq!(value["properties"]["$ref"]["$ref"], "https://calm/meta/core.json#/defs/b");
        assert_eq!(value["properties"]["enum"]["properties"]["$ref"], json!({"type": "string"}));
        assert_eq!(value["default"]["$ref"], "#/instance-data");
    }

    #[test]
    fn test_member_classification() {
        assert_eq!(SchemaMember::classify("enum", false), SchemaMember::Data);
        assert_eq!(SchemaMember::classify("enum", true), SchemaMember::Schema);
        assert_eq!(SchemaMember::classify("defs", false), SchemaMember::SchemaMap);
        assert_eq!(SchemaMember::classify("items", false), SchemaMember::Schema);
    }
}
