use axum::Router;
use tower_http::trace::TraceLayer;

use crate::bootstrap::Application;
use crate::{health, webhook};

pub fn router(app: &Application) -> Router {
    Router::new()
        .merge(health::router(app.config.clone()))
        .merge(webhook::router(app.webhook.clone()))
        .layer(TraceLayer::new_for_http())
}
