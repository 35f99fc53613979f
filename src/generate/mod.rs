//! Pattern Generator
//!
//! Instantiates a placeholder architecture from a pattern. Each position in
//! a section's `prefixItems` becomes one entity; properties are filled from
//! `const` values where the pattern pins them and from `{{ TOKEN }}`
//! placeholders everywhere else.
//!
//! Nodes, metadata and pass-through sections only get the properties their
//! definition lists as `required`, unless every property is requested.
//! Relationships always get every declared property.

use serde_json::{Map, Value};

use crate::error::{CalmError, Result};
use crate::schema::{absolutize, merge_definitions, normalize_id, Reference, SchemaDirectory, UnresolvedRef};

/// Bound on `oneOf`/`anyOf` unwrapping for a single definition
const MAX_ALTERNATIVE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Instantiate optional properties as well as required ones
    pub instantiate_all: bool,
    /// Fail when a `$ref` cannot be resolved instead of treating it as `{}`
    pub strict: bool,
}

/// Build an architecture document from `pattern`.
///
/// Document-local references inside the pattern are resolved against the
/// pattern's own `$id`.
pub fn instantiate(
    pattern: &Value,
    directory: &SchemaDirectory,
    options: &GenerateOptions,
) -> Result<Value> {
    let properties = pattern
        .get("properties")
        .and_then(|p| p.as_object())
        .ok_or_else(|| CalmError::InvalidPattern("pattern has no 'properties' object".to_string()))?;
    let context = pattern.get("$id").and_then(|v| v.as_str());

    let mut generator = Generator {
        directory,
        context,
        unresolved: Vec::new(),
        expanding: Vec::new(),
    };
    let required = required_keys(pattern);

    let mut output = Map::new();
    output.insert(
        "nodes".to_string(),
        generator.section("nodes", properties.get("nodes"), options.instantiate_all),
    );
    output.insert(
        "relationships".to_string(),
        generator.section("relationships", properties.get("relationships"), true),
    );

    for (key, definition) in properties {
        if matches!(key.as_str(), "nodes" | "relationships" | "metadata") {
            continue;
        }
        if let Some(value) =
            generator.top_level(key, definition, &required, options.instantiate_all)
        {
            output.insert(key.clone(), value);
        }
    }

    if let Some(definition) = properties.get("metadata") {
        if let Some(value) =
            generator.top_level("metadata", definition, &required, options.instantiate_all)
        {
            output.insert("metadata".to_string(), value);
        }
    }

    if !generator.unresolved.is_empty() {
        tracing::warn!(
            count = generator.unresolved.len(),
            "pattern references could not be resolved; affected entities are unconstrained"
        );
        if options.strict {
            let first = generator.unresolved.swap_remove(0);
            return Err(CalmError::UnresolvedReference {
                reference: first.reference,
                schema_id: first
                    .schema_id
                    .or_else(|| context.map(str::to_string))
                    .unwrap_or_default(),
            });
        }
    }

    Ok(Value::Object(output))
}

/// `{{ UNIQUE_ID }}` for `unique-id`
pub fn placeholder(key: &str) -> String {
    let token: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{{{{ {token} }}}}")
}

struct Generator<'a> {
    directory: &'a SchemaDirectory,
    context: Option<&'a str>,
    unresolved: Vec<UnresolvedRef>,
    /// References being expanded on the current path, as `<schema-id>#<pointer>`
    expanding: Vec<String>,
}

impl Generator<'_> {
    /// Run `f`, then forget the references it expanded
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let mark = self.expanding.len();
        let out = f(self);
        self.expanding.truncate(mark);
        out
    }

    /// `nodes` / `relationships`: one entity per `prefixItems` position
    fn section(&mut self, name: &str, definition: Option<&Value>, instantiate_all: bool) -> Value {
        let Some(definition) = definition else {
            tracing::warn!(section = name, "pattern does not define this section");
            return Value::Array(Vec::new());
        };
        self.scoped(|g| {
            let Some(definition) = g.dereference(definition.clone()) else {
                return Value::Array(Vec::new());
            };
            match definition.get("prefixItems").and_then(|p| p.as_array()) {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| g.entity(item, instantiate_all))
                        .collect(),
                ),
                None => {
                    if definition.get("items").is_some() {
                        tracing::warn!(section = name, "'items' is not instantiated; use 'prefixItems' instead");
                    } else {
                        tracing::warn!(section = name, "section has no prefixItems");
                    }
                    Value::Array(Vec::new())
                }
            }
        })
    }

    fn top_level(
        &mut self,
        key: &str,
        definition: &Value,
        required: &[String],
        instantiate_all: bool,
    ) -> Option<Value> {
        self.scoped(|g| {
            let definition = g.dereference(definition.clone())?;
            if let Some(items) = definition.get("prefixItems").and_then(|p| p.as_array()) {
                return Some(Value::Array(
                    items
                        .iter()
                        .map(|item| g.entity(item, instantiate_all))
                        .collect(),
                ));
            }
            if !instantiate_all && !required.iter().any(|r| r == key) {
                return None;
            }
            Some(g.property(key, &definition, instantiate_all))
        })
    }

    /// Instantiate one entity definition as an object
    fn entity(&mut self, definition: &Value, instantiate_all: bool) -> Value {
        self.scoped(|g| {
            let Some(mut definition) = g.dereference(definition.clone()) else {
                return Value::Object(Map::new());
            };
            for _ in 0..MAX_ALTERNATIVE_DEPTH {
                let Some(selected) = take_first_alternative(&definition) else { break };
                match g.dereference(selected) {
                    Some(next) => definition = next,
                    None => return Value::Object(Map::new()),
                }
            }
            g.object(&definition, instantiate_all)
        })
    }

    fn object(&mut self, definition: &Value, instantiate_all: bool) -> Value {
        let Some(properties) = definition.get("properties").and_then(|p| p.as_object()) else {
            return Value::Object(Map::new());
        };
        let required = required_keys(definition);

        let mut output = Map::new();
        for (key, property) in properties {
            if !instantiate_all && !required.iter().any(|r| r == key) {
                continue;
            }
            let value = self.property(key, property, instantiate_all);
            output.insert(key.clone(), value);
        }
        Value::Object(output)
    }

    fn property(&mut self, key: &str, definition: &Value, instantiate_all: bool) -> Value {
        self.scoped(|g| {
            let Some(mut definition) = g.dereference(definition.clone()) else {
                return Value::Object(Map::new());
            };
            for _ in 0..MAX_ALTERNATIVE_DEPTH {
                if definition.get("type").is_some() || definition.get("const").is_some() {
                    break;
                }
                let Some(selected) = take_first_alternative(&definition) else { break };
                match g.dereference(selected) {
                    Some(next) => definition = next,
                    None => return Value::Object(Map::new()),
                }
            }

            if let Some(value) = definition.get("const") {
                return value.clone();
            }

            match definition.get("type").and_then(|t| t.as_str()) {
                Some("object") => g.object(&definition, instantiate_all),
                Some("array") => match definition.get("prefixItems").and_then(|p| p.as_array()) {
                    Some(items) => Value::Array(
                        items
                            .iter()
                            .map(|item| g.entity(item, instantiate_all))
                            .collect(),
                    ),
                    None => Value::Array(vec![Value::String(placeholder(key))]),
                },
                _ => Value::String(placeholder(key)),
            }
        })
    }

    /// Replace a top-level `$ref` with the merge of its target (base) and
    /// the remaining keys (overlay).
    ///
    /// `None` when the reference is already being expanded further up the
    /// current path; the caller emits an empty value there.
    fn dereference(&mut self, mut definition: Value) -> Option<Value> {
        let Some(Value::String(reference)) = definition.as_object_mut().and_then(|o| o.remove("$ref"))
        else {
            return Some(definition);
        };
        let key = self.expansion_key(&reference);
        if self.expanding.contains(&key) {
            tracing::debug!(reference = %reference, "recursive reference left empty");
            return None;
        }
        self.expanding.push(key);

        let resolution = self.directory.resolve(&reference, self.context);
        self.unresolved.extend(resolution.unresolved);
        Some(merge_definitions(&resolution.definition, &definition))
    }

    fn expansion_key(&self, reference: &str) -> String {
        let parsed = Reference::parse(reference);
        let schema_id = match parsed.schema_id {
            Some(id) => normalize_id(&absolutize(id, self.context)),
            None => self.context.map(normalize_id).unwrap_or_default(),
        };
        format!("{schema_id}#{}", parsed.pointer)
    }
}

/// For a definition offering `oneOf`/`anyOf`, the first alternative merged
/// over the rest of the definition
fn take_first_alternative(definition: &Value) -> Option<Value> {
    let obj = definition.as_object()?;
    let keyword = ["oneOf", "anyOf"]
        .into_iter()
        .find(|k| obj.get(*k).and_then(|v| v.as_array()).is_some())?;
    let first = obj.get(keyword)?.as_array()?.first()?.clone();

    let mut rest = obj.clone();
    rest.remove("oneOf");
    rest.remove("anyOf");
    Some(merge_definitions(&Value::Object(rest), &first))
}

fn required_keys(definition: &Value) -> Vec<String> {
    definition
        .get("required")
        .and_then(|r| r.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn core() -> Value {
        json!({
            "$id": "https://example.com/core.json",
            "defs": {
                "node": {
                    "type": "object",
                    "properties": {
                        "unique-id": {"type": "string"},
                        "node-type": {"type": "string"},
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "interfaces": {"type": "array", "items": {"$ref": "#/defs/interface"}}
                    },
                    "required": ["unique-id", "node-type", "name"]
                },
                "interface": {
                    "type": "object",
                    "properties": {"unique-id": {"type": "string"}, "port": {"type": "integer"}},
                    "required": ["unique-id"]
                },
                "relationship": {
                    "type": "object",
                    "properties": {
                        "unique-id": {"type": "string"},
                        "description": {"type": "string"},
                        "relationship-type": {"type": "object"}
                    },
                    "required": ["unique-id"]
                }
            }
        })
    }

    fn directory() -> SchemaDirectory {
        let mut dir = SchemaDirectory::new();
        dir.add_value("core.json", core());
        dir
    }

    fn generate(pattern: &Value, instantiate_all: bool) -> Value {
        instantiate(
            pattern,
            &directory(),
            &GenerateOptions {
                instantiate_all,
                strict: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_placeholder_tokens() {
        assert_eq!(placeholder("unique-id"), "{{ UNIQUE_ID }}");
        assert_eq!(placeholder("host"), "{{ HOST }}");
        assert_eq!(placeholder("data.class"), "{{ DATA_CLASS }}");
    }

    #[test]
    fn test_required_only_is_minimal() {
        let pattern = json!({
            "properties": {
                "nodes": {"prefixItems": [{
                    "type": "object",
                    "properties": {"unique-id": {"type": "string"}, "name": {"type": "string"}},
                    "required": ["unique-id"]
                }]}
            }
        });

        let minimal = generate(&pattern, false);
        assert_eq!(minimal["nodes"], json!([{"unique-id": "{{ UNIQUE_ID }}"}]));

        let full = generate(&pattern, true);
        assert_eq!(
            full["nodes"],
            json!([{"unique-id": "{{ UNIQUE_ID }}", "name": "{{ NAME }}"}])
        );
    }

    #[test]
    fn test_relationships_always_get_every_property() {
        let pattern = json!({
            "properties": {
                "relationships": {"prefixItems": [{
                    "$ref": "https://example.com/core.json#/defs/relationship",
                    "properties": {
                        "unique-id": {"const": "web-to-api"},
                        "relationship-type": {"const": {"connects": {
                            "source": {"node": "web"},
                            "destination": {"node": "api"}
                        }}}
                    }
                }]}
            }
        });

        let generated = generate(&pattern, false);
        assert_eq!(
            generated["relationships"],
            json!([{
                "unique-id": "web-to-api",
                "description": "{{ DESCRIPTION }}",
                "relationship-type": {"connects": {
                    "source": {"node": "web"},
                    "destination": {"node": "api"}
                }}
            }])
        );
    }

    #[test]
    fn test_refs_merge_with_pattern_overlay() {
        let pattern = json!({
            "properties": {
                "nodes": {"prefixItems": [{
                    "$ref": "https://example.com/core.json#/defs/node",
                    "properties": {
                        "unique-id": {"const": "api"},
                        "node-type": {"const": "service"},
                        "interfaces": {
                            "type": "array",
                            "prefixItems": [{
                                "$ref": "https://example.com/core.json#/defs/interface",
                                "properties": {"unique-id": {"const": "api-http"}}
                            }]
                        }
                    },
                    "required": ["interfaces"]
                }]}
            }
        });

        let generated = generate(&pattern, false);
        assert_eq!(
            generated["nodes"],
            json!([{
                "unique-id": "api",
                "node-type": "service",
                "name": "{{ NAME }}",
                "interfaces": [{"unique-id": "api-http"}]
            }])
        );
    }

    #[test]
    fn test_array_without_prefix_items_gets_placeholder_element() {
        let pattern = json!({
            "properties": {
                "nodes": {"prefixItems": [{
                    "properties": {"adrs": {"type": "array", "items": {"type": "string"}}},
                    "required": ["adrs"]
                }]}
            }
        });
        assert_eq!(generate(&pattern, false)["nodes"], json!([{"adrs": ["{{ ADRS }}"]}]));
    }

    #[test]
    fn test_first_alternative_is_instantiated() {
        let pattern = json!({
            "properties": {
                "nodes": {"prefixItems": [{
                    "anyOf": [
                        {"properties": {"unique-id": {"const": "first"}}, "required": ["unique-id"]},
                        {"properties": {"unique-id": {"const": "second"}}, "required": ["unique-id"]}
                    ]
                }]}
            }
        });
        assert_eq!(generate(&pattern, false)["nodes"], json!([{"unique-id": "first"}]));
    }

    #[test]
    fn test_entity_without_properties_is_empty_object() {
        let pattern = json!({
            "properties": {"nodes": {"prefixItems": [{"type": "object"}]}}
        });
        assert_eq!(generate(&pattern, true)["nodes"], json!([{}]));
    }

    #[test]
    fn test_top_level_key_order() {
        let pattern = json!({
            "required": ["flows"],
            "properties": {
                "metadata": {"prefixItems": [{"properties": {"owner": {"const": "team-a"}}}]},
                "flows": {"type": "array"},
                "relationships": {"prefixItems": []},
                "nodes": {"prefixItems": []},
                "adrs": {"type": "array"}
            }
        });

        let generated = generate(&pattern, false);
        let keys: Vec<&String> = generated.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["nodes", "relationships", "flows", "metadata"]);
        assert_eq!(generated["metadata"], json!([{}]));
        assert_eq!(generated["flows"], json!(["{{ FLOWS }}"]));

        let generated = generate(&pattern, true);
        let keys: Vec<&String> = generated.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["nodes", "relationships", "flows", "adrs", "metadata"]);
        assert_eq!(generated["metadata"], json!([{"owner": "team-a"}]));
    }

    #[test]
    fn test_local_refs_resolve_against_pattern() {
        let pattern = json!({
            "$id": "https://example.com/pattern.json",
            "properties": {
                "nodes": {"prefixItems": [{"$ref": "#/defs/db"}]}
            },
            "defs": {
                "db": {"properties": {"unique-id": {"const": "db"}}, "required": ["unique-id"]}
            }
        });
        let mut dir = directory();
        dir.add_value("pattern.json", pattern.clone());

        let generated = instantiate(&pattern, &dir, &GenerateOptions::default()).unwrap();
        assert_eq!(generated["nodes"], json!([{"unique-id": "db"}]));
    }

    #[test]
    fn test_pattern_without_properties_is_rejected() {
        let err = instantiate(&json!({"type": "object"}), &directory(), &GenerateOptions::default())
            .unwrap_err();
        assert!(matches!(err, CalmError::InvalidPattern(_)));
    }

    #[test]
    fn test_unresolved_refs_are_lenient_unless_strict() {
        let pattern = json!({
            "properties": {
                "nodes": {"prefixItems": [{"$ref": "https://example.com/missing.json#/defs/node"}]}
            }
        });

        assert_eq!(generate(&pattern, false)["nodes"], json!([{}]));

        let err = instantiate(
            &pattern,
            &directory(),
            &GenerateOptions {
                instantiate_all: false,
                strict: true,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CalmError::UnresolvedReference { ref reference, .. }
                if reference == "https://example.com/missing.json#/defs/node"
        ));
    }

    #[test]
    fn test_self_referential_definition_terminates() {
        let pattern = json!({
            "$id": "https://example.com/tree.json",
            "properties": {
                "nodes": {"prefixItems": [{"$ref": "#/defs/tree"}]}
            },
            "defs": {
                "tree": {
                    "type": "object",
                    "properties": {
                        "unique-id": {"type": "string"},
                        "child": {"$ref": "#/defs/tree"}
                    },
                    "required": ["unique-id"]
                }
            }
        });
        let mut dir = directory();
        dir.add_value("tree.json", pattern.clone());

        let generated = instantiate(
            &pattern,
            &dir,
            &GenerateOptions {
                instantiate_all: true,
                strict: true,
            },
        )
        .unwrap();
        assert_eq!(
            generated["nodes"],
            json!([{"unique-id": "{{ UNIQUE_ID }}", "child": {}}])
        );
    }

    #[test]
    fn test_mutually_referential_definitions_terminate() {
        let shapes = json!({
            "$id": "https://example.com/shapes.json",
            "defs": {
                "group": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "owner": {"$ref": "#/defs/person"}}
                },
                "person": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}, "team": {"$ref": "#/defs/group"}}
                }
            }
        });
        let pattern = json!({
            "$id": "https://example.com/org.json",
            "properties": {
                "nodes": {"prefixItems": [
                    {"$ref": "shapes.json#/defs/group"},
                    {"$ref": "shapes.json#/defs/person"}
                ]}
            }
        });
        let mut dir = directory();
        dir.add_value("shapes.json", shapes);

        let generated = instantiate(
            &pattern,
            &dir,
            &GenerateOptions {
                instantiate_all: true,
                strict: true,
            },
        )
        .unwrap();
        assert_eq!(
            generated["nodes"],
            json!([
                {"name": "{{ NAME }}", "owner": {"name": "{{ NAME }}", "team": {}}},
                {"name": "{{ NAME }}", "team": {"name": "{{ NAME }}", "owner": {}}}
            ])
        );
    }
}
