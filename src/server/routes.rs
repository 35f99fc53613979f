//! Route handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use super::error::AppError;
use super::AppState;
use crate::loader::Document;
use crate::validate::{check_architecture, compile_offline, CompiledPattern, ValidationOutcome};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub schemas: usize,
    pub digest: String,
}

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "OK",
        schemas: state.directory.len(),
        digest: state.digest.clone(),
    })
}

/// Validate the posted architecture against the pattern named by its `$schema`
pub async fn validate(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<ValidationOutcome>), AppError> {
    let architecture = Document::parse("request.json", body)?;
    let schema_id = architecture
        .value
        .get("$schema")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadRequest("the architecture must declare a $schema".to_string()))?
        .to_string();

    let pattern_doc = state.directory.require_schema(&schema_id)?;
    let pattern = Document {
        identifier: schema_id.clone(),
        text: serde_json::to_string_pretty(pattern_doc.content.as_ref())
            .map_err(|e| AppError::Internal(e.to_string()))?,
        value: pattern_doc.content.as_ref().clone(),
    };

    let compiled = compiled_pattern(&state, &schema_id, &pattern)?;

    let mut diagnostics = Vec::new();
    let mut maps = Default::default();
    check_architecture(&compiled, &architecture, Some(&pattern), &mut diagnostics, &mut maps);
    let outcome = ValidationOutcome::new(diagnostics);

    tracing::info!(
        schema_id = %schema_id,
        has_errors = outcome.has_errors,
        diagnostics = outcome.diagnostics.len(),
        "validated architecture"
    );
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Compiled patterns are cached per schema id for the life of the server
fn compiled_pattern(
    state: &AppState,
    schema_id: &str,
    pattern: &Document,
) -> Result<Arc<CompiledPattern>, AppError> {
    if let Some(compiled) = state
        .compiled
        .read()
        .map_err(|_| AppError::Internal("pattern cache poisoned".to_string()))?
        .get(schema_id)
    {
        return Ok(compiled.clone());
    }

    let compiled = Arc::new(compile_offline(&pattern.value, &state.directory)?);
    state
        .compiled
        .write()
        .map_err(|_| AppError::Internal("pattern cache poisoned".to_string()))?
        .insert(schema_id.to_string(), compiled.clone());
    Ok(compiled)
}
