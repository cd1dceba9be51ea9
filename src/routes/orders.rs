use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::get,
};

use crate::{
    dto::orders::{CreateOrderRequest, CreatedOrder, OrderList, OrderView},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_SHOP, ROLE_USER, ensure_admin, ensure_role},
    models::OrderId,
    response::{ApiResponse, Meta},
    services::OrderError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_orders).post(create_order))
        .route(
            "/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Owner, admin, or a shop that sold something in the order. Everyone else
/// gets the same answer as for a missing order.
fn ensure_can_view(user: &AuthUser, view: &OrderView) -> AppResult<()> {
    let allowed = user.is_admin()
        || user.is(ROLE_USER, view.user_id)
        || (user.role == ROLE_SHOP && view.products.iter().any(|p| p.shop_id == user.subject_id));
    if allowed {
        Ok(())
    } else {
        Err(OrderError::NotFound(view.id).into())
    }
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreatedOrder>),
        (status = 400, description = "Invalid cart"),
        (status = 404, description = "Unknown product"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ApiResponse<CreatedOrder>>)> {
    ensure_role(&user, ROLE_USER)?;
    let payload = parse_body(payload)?;

    let id = state
        .orders
        .create_order(user.subject_id, payload.into())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Order created successfully",
            CreatedOrder { id },
            Some(Meta::empty()),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    responses((status = 200, description = "Every order", body = ApiResponse<OrderList>)),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    ensure_admin(&user)?;
    let items = state.orders.get_all_orders().await?;
    let meta = Meta::count(items.len());
    Ok(Json(ApiResponse::success("Ok", OrderList { items }, Some(meta))))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its products", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<OrderId>,
) -> AppResult<Json<ApiResponse<OrderView>>> {
    let view = state.orders.get_order(id).await?;
    ensure_can_view(&user, &view)?;
    Ok(Json(ApiResponse::success("OK", view, Some(Meta::empty()))))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order re-priced", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is no longer pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<OrderId>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<OrderView>>> {
    // Ownership before the body, so non-owners always see 404.
    if user.role != ROLE_USER {
        return Err(OrderError::NotFound(id).into());
    }
    let current = state.orders.editable_order(id, user.subject_id).await?;
    let payload = parse_body(payload)?;

    let view = state.orders.reprice_order(current, payload.into()).await?;
    Ok(Json(ApiResponse::success(
        "Order updated successfully",
        view,
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order and its lines removed"),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<OrderId>,
) -> AppResult<Json<ApiResponse<CreatedOrder>>> {
    ensure_admin(&user)?;
    state.orders.delete_order(id).await?;
    Ok(Json(ApiResponse::success(
        "Order deleted",
        CreatedOrder { id },
        Some(Meta::empty()),
    )))
}
