use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::checkout::TransactionList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::Transaction,
    response::ApiResponse,
    routes::params::SalesQuery,
    services::dashboard_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list_sales))
        .route("/sales/{id}/mark-as-sent", patch(mark_as_sent))
}

#[utoipa::path(
    get,
    path = "/api/dashboard/sales",
    params(SalesQuery),
    responses(
        (status = 200, description = "Transactions for the caller's products", body = ApiResponse<TransactionList>),
        (status = 403, description = "Artisans only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SalesQuery>,
) -> AppResult<Json<ApiResponse<TransactionList>>> {
    let resp = dashboard_service::list_sales(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/dashboard/sales/{id}/mark-as-sent",
    params(
        ("id" = Uuid, Path, description = "Transaction ID")
    ),
    responses(
        (status = 200, description = "Marked as sent", body = ApiResponse<Transaction>),
        (status = 400, description = "Already sent"),
        (status = 403, description = "Not the seller"),
        (status = 404, description = "Transaction not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn mark_as_sent(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Transaction>>> {
    let resp = dashboard_service::mark_as_sent(&state, &user, id).await?;
    Ok(Json(resp))
}
