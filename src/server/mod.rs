//! Validation HTTP server
//!
//! `POST /calm/validate` checks an architecture against the pattern its
//! `$schema` names, looked up in a schema directory loaded at startup.
//! `GET /calm/validate/health` reports liveness and the directory digest.

mod error;
mod routes;

pub use error::{AppError, ErrorBody, ErrorDetail};

use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::schema::SchemaDirectory;
use crate::validate::CompiledPattern;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<SchemaDirectory>,
    digest: String,
    compiled: Arc<RwLock<HashMap<String, Arc<CompiledPattern>>>>,
}

impl AppState {
    pub fn new(directory: SchemaDirectory) -> Self {
        let digest = directory.digest().to_string();
        Self {
            directory: Arc::new(directory),
            digest,
            compiled: Arc::default(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/calm/validate", post(routes::validate))
        .route("/calm/validate/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, schemas = state.directory.len(), "validation server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
