use axum::{
    routing::{get, post},
    Router,
};
use registry::AppRegistry;

use crate::handler::admin::{
    mark_overdue, run_audit, send_reminders, show_book_queue, sweep_offers,
};

pub fn build_admin_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/books/:book_id/reservations", get(show_book_queue))
        .route("/sweeps/overdue", post(mark_overdue))
        .route("/sweeps/offers", post(sweep_offers))
        .route("/audit", post(run_audit))
        .route("/reminders", post(send_reminders));

    Router::new().nest("/admin", routers)
}
