use crate::domain::model::IndexEntry;
use crate::transport::http::handlers::{health, products};
use crate::transport::http::types::ApiResponse;
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        products::save_product_handler,
        products::get_product_by_hash_handler
    ),
    components(schemas(ApiResponse, IndexEntry))
)]
#[allow(dead_code)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/api/products", post(products::save_product_handler))
        .route(
            "/api/products/hash/:hash",
            get(products::get_product_by_hash_handler),
        )
        .with_state(app_state)
}
