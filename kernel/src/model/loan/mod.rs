use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::{
    id::{BookId, LoanId, UserId},
    reservation::Reservation,
};

pub mod event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

#[derive(Debug, Clone)]
pub struct Loan {
    pub id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub borrowed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

impl Loan {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        crate::lifecycle::is_overdue(self.status, self.due_at, now)
    }

    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        crate::lifecycle::days_overdue(self.status, self.due_at, now)
    }
}

// 返却処理の結果。予約キューの先頭へオファーが回った場合はその予約も返す。
// 呼び出し側はコミット後の通知とキャッシュ無効化にだけ使う。
#[derive(Debug, Clone)]
pub struct ReturnOutcome {
    pub loan: Loan,
    pub offered: Option<Reservation>,
}
