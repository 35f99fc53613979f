//! Core-schema version check
//!
//! Documents referencing CALM meta-schemas from a release other than the
//! bundled one get a warning. Validation still runs.

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::diagnostics::{pointer_push, Diagnostic};
use crate::schema::{SchemaMember, BUNDLED_CALM_VERSION};

static CORE_SCHEMA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://calm\.finos\.org/(release|draft)/([^/]+)/meta/")
        .expect("core schema URL pattern is valid")
});

/// Warn for each distinct core-schema version referenced by `$schema` or
/// `$ref` inside `document` that differs from the bundled release
pub fn check_core_version(document: &Value) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    let mut diagnostics = Vec::new();
    walk(document, "", false, &mut seen, &mut diagnostics);
    diagnostics
}

fn walk(
    value: &Value,
    path: &str,
    in_schema_map: bool,
    seen: &mut HashSet<String>,
    out: &mut Vec<Diagnostic>,
) {
    match value {
        Value::Object(obj) => {
            for (key, child) in obj {
                let child_path = pointer_push(path, key);
                if !in_schema_map && matches!(key.as_str(), "$schema" | "$ref") {
                    if let Some(url) = child.as_str() {
                        check_url(url, &child_path, seen, out);
                    }
                    continue;
                }
                match SchemaMember::classify(key, in_schema_map) {
                    SchemaMember::Data => {}
                    SchemaMember::Schema => walk(child, &child_path, false, seen, out),
                    SchemaMember::SchemaMap => walk(child, &child_path, true, seen, out),
                }
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &pointer_push(path, i), false, seen, out);
            }
        }
        _ => {}
    }
}

fn check_url(url: &str, path: &str, seen: &mut HashSet<String>, out: &mut Vec<Diagnostic>) {
    let Some(captures) = CORE_SCHEMA_URL.captures(url) else { return };
    let channel = &captures[1];
    let version = &captures[2];
    if channel == "release" && version == BUNDLED_CALM_VERSION {
        return;
    }
    if !seen.insert(format!("{channel}/{version}")) {
        return;
    }

    let detail = match (lenient_semver(version), lenient_semver(BUNDLED_CALM_VERSION)) {
        (Some(found), Some(bundled)) if found < bundled => " (older than the bundled release)",
        (Some(found), Some(bundled)) if found > bundled => " (newer than the bundled release)",
        _ => "",
    };
    out.push(Diagnostic::warning(
        "core-schema-version-mismatch",
        format!(
            "references CALM core schema {channel} {version}{detail}, but this tool bundles release {BUNDLED_CALM_VERSION}"
        ),
        path,
    ));
}

/// `1.1` → `1.1.0`; `None` for anything that is not numeric
fn lenient_semver(version: &str) -> Option<semver::Version> {
    let padded = match version.matches('.').count() {
        0 => format!("{version}.0.0"),
        1 => format!("{version}.0"),
        _ => version.to_string(),
    };
    semver::Version::parse(&padded).ok()
}
