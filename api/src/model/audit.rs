use kernel::model::{
    audit::{RepairEntry, RepairReport},
    book::BookStatus,
    id::BookId,
};
use serde::{Deserialize, Serialize};

use super::reservation::ReservationResponse;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequest {
    // 省略時は全蔵書を対象にする
    pub book_id: Option<BookId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReportResponse {
    pub checked_books: usize,
    pub corrections: Vec<RepairEntryResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairEntryResponse {
    pub book_id: BookId,
    pub available_before: i32,
    pub available_after: i32,
    pub status_before: BookStatus,
    pub status_after: BookStatus,
}

impl From<RepairReport> for RepairReportResponse {
    fn from(report: RepairReport) -> Self {
        Self {
            checked_books: report.checked_books,
            corrections: report.corrections.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<RepairEntry> for RepairEntryResponse {
    fn from(entry: RepairEntry) -> Self {
        Self {
            book_id: entry.book_id,
            available_before: entry.available_before,
            available_after: entry.available_after,
            status_before: entry.status_before,
            status_after: entry.status_after,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueSweepResponse {
    pub marked: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSweepQuery {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSweepResponse {
    pub dry_run: bool,
    pub expired: Vec<ReservationResponse>,
    pub offered: Vec<ReservationResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSweepResponse {
    pub due_soon: usize,
    pub overdue: usize,
}
