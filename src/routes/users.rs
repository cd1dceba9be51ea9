use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::orders::OrderList,
    error::AppResult,
    middleware::auth::{AuthUser, ROLE_USER, ensure_self_or_admin},
    models::UserId,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{user_id}/orders", get(list_user_orders))
}

#[utoipa::path(
    get,
    path = "/api/users/{user_id}/orders",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Orders placed by the user", body = ApiResponse<OrderList>),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_self_or_admin(&user, ROLE_USER, user_id)?;
    let items = state.orders.get_orders_by_user(user_id).await?;
    let meta = Meta::count(items.len());
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}
