use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::model::reservation::{Reservation, ReservationStatus};
use shared::error::AppError;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct ReservationRow {
    pub reservation_id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub priority: i32,
    pub requested_at: DateTime<Utc>,
    pub offer_expires_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = AppError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = ReservationStatus::from_str(&row.status).map_err(|_| {
            AppError::ConversionEntityError(format!("invalid reservation status: {}", row.status))
        })?;
        Ok(Reservation {
            id: row.reservation_id.into(),
            user_id: row.user_id.into(),
            book_id: row.book_id.into(),
            priority: row.priority,
            requested_at: row.requested_at,
            offer_expires_at: row.offer_expires_at,
            status,
        })
    }
}
