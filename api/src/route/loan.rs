use axum::{
    routing::{get, post, put},
    Router,
};
use registry::AppRegistry;

use crate::handler::loan::{borrow_book, return_book, show_my_loans};

pub fn build_loan_routers() -> Router<AppRegistry> {
    let routers = Router::new()
        .route("/", post(borrow_book))
        .route("/me", get(show_my_loans))
        .route("/:loan_id/returned", put(return_book));

    Router::new().nest("/loans", routers)
}
