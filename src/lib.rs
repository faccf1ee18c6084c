use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, Uri},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod store;

#[cfg(test)]
mod test_support;

use auth::IdentityProvider;
use config::Config;
use models::{Resource, RESOURCES};
use store::RecordStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<Config>,
}

/// Mount one resource on `/{route}`, `/{route}/` and `/{route}/*rest` (the
/// wildcard never matches an empty tail). Every method is accepted here; the
/// handler itself answers unsupported ones with 405.
fn resource_routes(resource: &'static Resource) -> Router<AppState> {
    let handler = move |State(state): State<AppState>,
                        method: Method,
                        uri: Uri,
                        headers: HeaderMap,
                        body: Bytes| {
        handlers::records::handle(state, resource, method, uri, headers, body)
    };

    Router::new()
        .route(&format!("/{}", resource.route), any(handler))
        .route(&format!("/{}/", resource.route), any(handler))
        .route(&format!("/{}/*rest", resource.route), any(handler))
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(hv) => Some(hv),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
                axum::http::header::ACCEPT,
            ]),
    )
}

pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    for resource in RESOURCES {
        app = app.merge(resource_routes(resource));
    }

    if let Some(cors) = cors_layer(&state.config.cors_allowed_origins) {
        app = app.layer(cors);
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_skipped_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["http://localhost:3000".to_string()]).is_some());
    }
}
