//! Includes for the catalogue modules (books, circulations, fines). They are
//! deployed separately; this service only reserves their URL prefixes.

use axum::{routing::any, Router};
use std::sync::Arc;

use crate::api::server::AppState;
use crate::error::AppError;

/// Every module mounted under `/api/<name>/`.
pub const MODULES: [&str; 3] = ["books", "circulations", "fines"];

/// Routes for one module prefix. All methods and sub-paths answer 501.
pub fn include(name: &'static str) -> Router<Arc<AppState>> {
    let unavailable = move || async move {
        AppError::NotImplemented(format!(
            "The {name} module is not available in this deployment."
        ))
    };

    let prefix = format!("/api/{name}");

    Router::new()
        .route(&prefix, any(unavailable))
        .route(&format!("{prefix}/"), any(unavailable))
        .route(&format!("{prefix}/{{*rest}}"), any(unavailable))
}
