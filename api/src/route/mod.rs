use axum::Router;
use registry::AppRegistry;

pub mod admin;
pub mod book;
pub mod health;
pub mod loan;
pub mod reservation;

pub fn routes() -> Router<AppRegistry> {
    let routers = Router::new()
        .merge(book::build_book_routers())
        .merge(loan::build_loan_routers())
        .merge(reservation::build_reservation_routers())
        .merge(admin::build_admin_routers());

    Router::new()
        .merge(health::build_health_check_routers())
        .nest("/api/v1", routers)
}
