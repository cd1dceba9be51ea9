use std::sync::Arc;

use crate::services::OrderService;

#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(orders: OrderService, jwt_secret: impl Into<Arc<str>>) -> Self {
        Self {
            orders,
            jwt_secret: jwt_secret.into(),
        }
    }
}
