use chrono::{DateTime, Utc};
use garde::Validate;
use kernel::model::{
    id::{BookId, LoanId, ReservationId, UserId},
    loan::{Loan, LoanStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BorrowBookRequest {
    #[garde(skip)]
    pub book_id: BookId,
    // 未指定なら運用設定の既定値を使う
    #[garde(inner(range(min = 1, max = 90)))]
    pub loan_period_days: Option<i64>,
    // オファー済み予約を行使して借りる場合に指定する
    #[garde(skip)]
    pub reservation_id: Option<ReservationId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanResponse {
    pub id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub is_overdue: bool,
    pub days_overdue: i64,
}

impl From<Loan> for LoanResponse {
    fn from(loan: Loan) -> Self {
        let now = Utc::now();
        Self {
            is_overdue: loan.is_overdue(now),
            days_overdue: loan.days_overdue(now),
            id: loan.id,
            book_id: loan.book_id,
            user_id: loan.user_id,
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: loan.returned_at,
            status: loan.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_period_must_stay_within_bounds() {
        let valid = BorrowBookRequest {
            book_id: BookId::new(),
            loan_period_days: Some(30),
            reservation_id: None,
        };
        assert!(valid.validate(&()).is_ok());

        let unspecified = BorrowBookRequest {
            book_id: BookId::new(),
            loan_period_days: None,
            reservation_id: None,
        };
        assert!(unspecified.validate(&()).is_ok());

        let too_long = BorrowBookRequest {
            book_id: BookId::new(),
            loan_period_days: Some(365),
            reservation_id: None,
        };
        assert!(too_long.validate(&()).is_err());

        let zero = BorrowBookRequest {
            book_id: BookId::new(),
            loan_period_days: Some(0),
            reservation_id: None,
        };
        assert!(zero.validate(&()).is_err());
    }
}
