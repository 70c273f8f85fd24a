use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use garde::Validate;
use kernel::{
    model::{
        id::{BookId, ReservationId},
        reservation::event::{CancelReservation, CreateReservation},
    },
    notification::NotificationEvent,
};
use registry::AppRegistry;
use shared::error::AppResult;

use crate::{
    extractor::AuthorizedActor,
    handler::run_post_commit,
    model::reservation::{CreateReservationRequest, QueuePositionResponse, ReservationResponse},
};

pub async fn reserve_book(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Json(req): Json<CreateReservationRequest>,
) -> AppResult<Json<ReservationResponse>> {
    req.validate(&())?;
    // 優先度を指定できるのは管理者だけ
    let priority = if user.is_admin() {
        req.priority.unwrap_or(0)
    } else {
        0
    };

    let reservation = registry
        .reservation_repository()
        .create(CreateReservation {
            user_id: user.id(),
            book_id: req.book_id,
            priority,
        })
        .await?;

    // 待ち行列の長さはスナップショットに含まれるので無効化が要る
    run_post_commit(
        registry.post_commit_hooks(),
        &registry.notification_dispatcher(),
        reservation.book_id,
        vec![],
    )
    .await;
    Ok(Json(reservation.into()))
}

pub async fn cancel_reservation(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Path(reservation_id): Path<ReservationId>,
) -> AppResult<StatusCode> {
    let outcome = registry
        .reservation_repository()
        .cancel(CancelReservation {
            reservation_id,
            actor: user.actor,
        })
        .await?;

    let mut events = Vec::new();
    if let Some(reservation) = outcome.offered {
        events.push(NotificationEvent::ReservationAvailable { reservation });
    }
    run_post_commit(
        registry.post_commit_hooks(),
        &registry.notification_dispatcher(),
        outcome.cancelled.book_id,
        events,
    )
    .await;
    Ok(StatusCode::OK)
}

pub async fn show_queue_position(
    user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<BookId>,
) -> AppResult<Json<QueuePositionResponse>> {
    let position = registry
        .reservation_repository()
        .queue_position(book_id, user.id())
        .await?;
    Ok(Json(QueuePositionResponse { book_id, position }))
}
