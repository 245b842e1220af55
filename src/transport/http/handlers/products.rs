use crate::domain::model::{IndexEntry, ProductHash};
use crate::transport::http::types::{json_422, ApiResponse, AppState};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = IndexEntry,
    responses(
        (status = 200, description = "Entry stored", body = ApiResponse),
        (status = 400, description = "Bad request", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn save_product_handler(
    State(state): State<AppState>,
    request: Result<Json<IndexEntry>, JsonRejection>,
) -> impl IntoResponse {
    let Json(entry) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(e, "{\"hash\": \"...\", \"vendorAddress\": \"...\", \"name\": \"...\"}")
                .into_response();
        }
    };

    match state.index_service.save(entry).await {
        Ok(stored) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: serde_json::to_value(&stored).ok(),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            let status = if e.contains("must not be empty") {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                Json(ApiResponse {
                    success: false,
                    data: None,
                    error: Some(e),
                }),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/products/hash/{hash}",
    params(
        ("hash" = String, Path, description = "Product hash (64 hex chars, optional 0x prefix)")
    ),
    responses(
        (status = 200, description = "Entry found", body = ApiResponse),
        (status = 400, description = "Invalid hash", body = ApiResponse),
        (status = 404, description = "No entry for this hash", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn get_product_by_hash_handler(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> impl IntoResponse {
    let hash: ProductHash = match hash.parse() {
        Ok(h) => h,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse {
                    success: false,
                    data: None,
                    error: Some(format!("Invalid hash: {}", e)),
                }),
            )
                .into_response();
        }
    };

    match state.index_service.lookup(&hash).await {
        Ok(Some(entry)) => (
            StatusCode::OK,
            Json(ApiResponse {
                success: true,
                data: serde_json::to_value(&entry).ok(),
                error: None,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some("No product found for the given hash.".to_string()),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse {
                success: false,
                data: None,
                error: Some(e),
            }),
        )
            .into_response(),
    }
}
