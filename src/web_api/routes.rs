pub mod account_routes;
pub mod api_routes;
pub mod task_routes;

use axum::Router;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::app_state::SharedState;

pub fn map_routes(app_state: SharedState) -> Router {
    let media = ServeDir::new(app_state.media.root());
    let media_prefix = app_state.settings.media_url.trim_end_matches('/').to_string();

    let router = Router::new()
        .merge(task_routes::get_router(app_state.clone()))
        .merge(account_routes::get_router(app_state.clone()))
        .merge(api_routes::get_router(app_state));

    // axum refuses to nest at the root.
    let router = if media_prefix.is_empty() {
        router.fallback_service(media)
    } else {
        router.nest_service(&media_prefix, media)
    };

    router.layer(TraceLayer::new_for_http())
}
