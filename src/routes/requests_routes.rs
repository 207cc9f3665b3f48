use axum::{Router, routing::{delete, get, post}};
use crate::{AppState, controllers::requests_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/users/:user_id/requests",
            get(requests_controller::get_user_requests).post(requests_controller::post_user_request),
        )
        .route(
            "/users/:user_id/requests/:request_id",
            delete(requests_controller::delete_user_request),
        )
        .route("/requests", get(requests_controller::get_all_requests))
        .route("/subscriptions", get(requests_controller::get_subscriptions))
        .route("/requests/:request_id", get(requests_controller::get_request))
        .route("/requests/:request_id/users", get(requests_controller::get_request_users))
        .route("/server-queries", get(requests_controller::get_server_queries))
        .route("/admin/reload", post(requests_controller::post_reload))
}
