use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::{
    model::{
        id::LoanId,
        loan::event::{CreateLoan, ReturnLoan},
    },
    notification::NotificationEvent,
};
use registry::AppRegistry;
use shared::error::AppResult;

use crate::{
    extractor::AuthorizedActor,
    handler::run_post_commit,
    model::loan::{BorrowBookRequest, LoanResponse},
};

pub async fn borrow_book(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Json(req): Json<BorrowBookRequest>,
) -> AppResult<Json<LoanResponse>> {
    req.validate(&())?;
    let loan_period_days = req
        .loan_period_days
        .unwrap_or(registry.circulation_config().default_loan_period_days);

    let loan = registry
        .circulation_repository()
        .borrow(CreateLoan {
            user_id: user.id(),
            book_id: req.book_id,
            loan_period_days,
            reservation_id: req.reservation_id,
        })
        .await?;

    run_post_commit(
        registry.post_commit_hooks(),
        &registry.notification_dispatcher(),
        loan.book_id,
        vec![NotificationEvent::BorrowConfirmation { loan: loan.clone() }],
    )
    .await;
    Ok(Json(loan.into()))
}

pub async fn return_book(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Path(loan_id): Path<LoanId>,
) -> AppResult<StatusCode> {
    let outcome = registry
        .circulation_repository()
        .return_loan(ReturnLoan {
            loan_id,
            actor: user.actor,
        })
        .await?;

    let mut events = vec![NotificationEvent::ReturnConfirmation {
        loan: outcome.loan.clone(),
    }];
    if let Some(reservation) = outcome.offered {
        events.push(NotificationEvent::ReservationAvailable { reservation });
    }
    run_post_commit(
        registry.post_commit_hooks(),
        &registry.notification_dispatcher(),
        outcome.loan.book_id,
        events,
    )
    .await;
    Ok(StatusCode::OK)
}

pub async fn show_my_loans(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
) -> AppResult<Json<Vec<LoanResponse>>> {
    let loans = registry
        .circulation_repository()
        .find_active_by_user(user.id())
        .await?;
    Ok(Json(loans.into_iter().map(LoanResponse::from).collect()))
}
