use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::orders::OrderList,
    error::AppResult,
    middleware::auth::{AuthUser, ROLE_SHOP, ensure_self_or_admin},
    models::ShopId,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{shop_id}/orders", get(list_shop_orders))
}

#[utoipa::path(
    get,
    path = "/api/shops/{shop_id}/orders",
    params(("shop_id" = i64, Path, description = "Shop id")),
    responses(
        (status = 200, description = "Orders containing the shop's products", body = ApiResponse<OrderList>),
        (status = 404, description = "Shop not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_shop_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Path(shop_id): Path<ShopId>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_self_or_admin(&user, ROLE_SHOP, shop_id)?;
    let items = state.orders.get_orders_by_shop(shop_id).await?;
    let meta = Meta::count(items.len());
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}
