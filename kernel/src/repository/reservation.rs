use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::error::AppResult;

use crate::model::{
    id::{BookId, UserId},
    reservation::{
        event::{CancelReservation, CreateReservation},
        CancelOutcome, ExpiredOffer, Reservation,
    },
};

#[mockall::automock]
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn create(&self, event: CreateReservation) -> AppResult<Reservation>;
    async fn cancel(&self, event: CancelReservation) -> AppResult<CancelOutcome>;
    // 期限切れオファーの一括処理。蔵書ごとに原子的に実行し、
    // 解放した一冊を次の待ちへカスケードする。再実行しても二重解放しない。
    async fn expire_offers(&self, now: DateTime<Utc>) -> AppResult<Vec<ExpiredOffer>>;
    // 期限切れ対象の事前確認（dry-run 用、状態は変更しない）
    async fn find_expired_offers(&self, now: DateTime<Utc>) -> AppResult<Vec<Reservation>>;
    // Pending 予約の待ち順位（1 始まり）。予約がなければ None
    async fn queue_position(&self, book_id: BookId, user_id: UserId) -> AppResult<Option<i64>>;
    // 蔵書の未決着（Offered / Pending）の予約一覧。オファー中が先、残りは待ち順
    async fn find_for_book(&self, book_id: BookId) -> AppResult<Vec<Reservation>>;
}
