use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::{
        cart::CartList,
        checkout::{CheckoutRequest, CheckoutResult, TransactionList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::Pagination,
    services::checkout_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout_summary).post(process_checkout))
        .route("/purchases", get(list_purchases))
}

#[utoipa::path(
    get,
    path = "/api/checkout",
    responses(
        (status = 200, description = "Cart lines and total to be charged", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn checkout_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartList>>> {
    let resp = checkout_service::checkout_summary(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Stock decremented, transactions recorded, cart cleared", body = ApiResponse<CheckoutResult>),
        (status = 422, description = "Empty cart, insufficient stock or invalid buyer data; nothing was changed")
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn process_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<CheckoutResult>>> {
    let resp = checkout_service::process_checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/checkout/purchases",
    params(Pagination),
    responses(
        (status = 200, description = "Transactions bought by the caller", body = ApiResponse<TransactionList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn list_purchases(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<TransactionList>>> {
    let resp = checkout_service::list_purchases(&state, &user, pagination).await?;
    Ok(Json(resp))
}
