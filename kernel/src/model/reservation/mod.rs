use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::id::{BookId, ReservationId, UserId};

pub mod event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Offered,
    Cancelled,
    Fulfilled,
    Expired,
}

impl ReservationStatus {
    // Cancelled / Fulfilled / Expired は終端状態
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            ReservationStatus::Cancelled | ReservationStatus::Fulfilled | ReservationStatus::Expired
        )
    }
}

#[derive(Debug, Clone)]
pub struct Reservation {
    pub id: ReservationId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub priority: i32,
    pub requested_at: DateTime<Utc>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub cancelled: Reservation,
    // キャンセルされたのがオファー済み予約だった場合、次の待ちへ回ったオファー
    pub offered: Option<Reservation>,
}

#[derive(Debug, Clone)]
pub struct ExpiredOffer {
    pub reservation: Reservation,
    // 解放された一冊が次の待ちへ回った場合のオファー
    pub offered: Option<Reservation>,
}
