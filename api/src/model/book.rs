use kernel::model::{
    book::{AvailabilitySnapshot, BookStatus},
    id::BookId,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub book_id: BookId,
    pub total_copies: i32,
    pub available_copies: i32,
    pub status: BookStatus,
    pub pending_reservations: i64,
}

impl From<AvailabilitySnapshot> for AvailabilityResponse {
    fn from(s: AvailabilitySnapshot) -> Self {
        Self {
            book_id: s.book_id,
            total_copies: s.total_copies,
            available_copies: s.available_copies,
            status: s.status,
            pending_reservations: s.pending_reservations,
        }
    }
}
