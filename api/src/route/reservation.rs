use axum::{
    routing::{delete, post},
    Router,
};
use registry::AppRegistry;

use crate::handler::reservation::{cancel_reservation, reserve_book};

pub fn build_reservation_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/", post(reserve_book))
        .route("/:reservation_id", delete(cancel_reservation));

    Router::new().nest("/reservations", routers)
}
