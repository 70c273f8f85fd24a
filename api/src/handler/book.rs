use axum::{
    extract::{Path, State},
    Json,
};
use kernel::model::id::BookId;
use registry::AppRegistry;
use shared::error::{AppError, AppResult};

use crate::{extractor::AuthorizedActor, model::book::AvailabilityResponse};

// 表示専用のスナップショット。キャッシュから配信されることがある
pub async fn show_availability(
    _user: AuthorizedActor,
    State(registry): State<AppRegistry>,
    Path(book_id): Path<BookId>,
) -> AppResult<Json<AvailabilityResponse>> {
    let snapshot = registry
        .circulation_repository()
        .availability(book_id)
        .await?
        .ok_or_else(|| AppError::EntityNotFound(format!("book not found: {book_id}")))?;
    Ok(Json(snapshot.into()))
}
