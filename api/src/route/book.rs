use axum::{routing::get, Router};
use registry::AppRegistry;

use crate::handler::{book::show_availability, reservation::show_queue_position};

pub fn build_book_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/:book_id/availability", get(show_availability))
        .route("/:book_id/queue-position", get(show_queue_position));

    Router::new().nest("/books", routers)
}
