use chrono::{DateTime, Utc};
use garde::Validate;
use kernel::model::{
    id::{BookId, ReservationId, UserId},
    reservation::{Reservation, ReservationStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    #[garde(skip)]
    pub book_id: BookId,
    // 優先度の指定は管理者のみ有効。一般利用者は常に 0 で積まれる
    #[garde(inner(range(min = 0, max = 100)))]
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    pub id: ReservationId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub priority: i32,
    pub requested_at: DateTime<Utc>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub status: ReservationStatus,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id,
            book_id: r.book_id,
            user_id: r.user_id,
            priority: r.priority,
            requested_at: r.requested_at,
            offer_expires_at: r.offer_expires_at,
            status: r.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePositionResponse {
    pub book_id: BookId,
    // Pending 予約がなければ None
    pub position: Option<i64>,
}
