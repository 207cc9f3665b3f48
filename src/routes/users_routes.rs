use axum::{Router, routing::get};
use crate::{AppState, controllers::users_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(
            "/users",
            get(users_controller::list_users).post(users_controller::post_user),
        )
        .route(
            "/users/:user_id",
            get(users_controller::get_user)
                .put(users_controller::put_user)
                .delete(users_controller::delete_user),
        )
}
