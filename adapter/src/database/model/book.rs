use std::str::FromStr;

use kernel::model::book::{Book, BookStatus};
use shared::error::AppError;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct BookRow {
    pub book_id: Uuid,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub status: String,
}

impl BookRow {
    pub fn status(&self) -> Result<BookStatus, AppError> {
        BookStatus::from_str(&self.status)
            .map_err(|_| AppError::ConversionEntityError(format!("invalid book status: {}", self.status)))
    }
}

impl TryFrom<BookRow> for Book {
    type Error = AppError;

    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        let status = row.status()?;
        Ok(Book {
            id: row.book_id.into(),
            isbn: row.isbn,
            title: row.title,
            author: row.author,
            total_copies: row.total_copies,
            available_copies: row.available_copies,
            status,
        })
    }
}

// 在庫スナップショット用の集計行
#[derive(Debug, sqlx::FromRow)]
pub struct AvailabilityRow {
    pub total_copies: i32,
    pub available_copies: i32,
    pub status: String,
    pub pending_reservations: i64,
}
