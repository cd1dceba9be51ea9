use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::orders::{CreateOrderRequest, CreatedOrder, OrderList, OrderProductRequest, OrderView, OrderedProduct},
    models::OrderStatus,
    response::{ApiResponse, Meta},
    routes::{health, orders, shops, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        orders::create_order,
        orders::list_all_orders,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
        users::list_user_orders,
        shops::list_shop_orders
    ),
    components(
        schemas(
            OrderStatus,
            CreateOrderRequest,
            OrderProductRequest,
            CreatedOrder,
            OrderedProduct,
            OrderView,
            OrderList,
            Meta,
            ApiResponse<CreatedOrder>,
            ApiResponse<OrderView>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Orders", description = "Order placement and order views"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
