use std::str::FromStr;

use chrono::{DateTime, Utc};
use kernel::model::loan::{Loan, LoanStatus};
use shared::error::AppError;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct LoanRow {
    pub loan_id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: String,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let status = LoanStatus::from_str(&row.status)
            .map_err(|_| AppError::ConversionEntityError(format!("invalid loan status: {}", row.status)))?;
        Ok(Loan {
            id: row.loan_id.into(),
            user_id: row.user_id.into(),
            book_id: row.book_id.into(),
            borrowed_at: row.borrowed_at,
            due_at: row.due_at,
            returned_at: row.returned_at,
            status,
        })
    }
}
