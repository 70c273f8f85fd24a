use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::error::AppResult;

use crate::model::{
    book::AvailabilitySnapshot,
    id::{BookId, LoanId, UserId},
    loan::{
        event::{CreateLoan, ReturnLoan},
        Loan, ReturnOutcome,
    },
};

#[mockall::automock]
#[async_trait]
pub trait CirculationRepository: Send + Sync {
    // 貸出操作。蔵書行の排他ロック下で在庫チェック・減算・貸出レコード挿入を
    // ひとつのトランザクションとして実行する。
    async fn borrow(&self, event: CreateLoan) -> AppResult<Loan>;
    // 返却操作。貸出行→蔵書行の順にロックし、予約キューへの引き渡しまで
    // 同一トランザクションで行う。
    async fn return_loan(&self, event: ReturnLoan) -> AppResult<ReturnOutcome>;
    // 返却期限超過の一括反映。再実行しても安全。
    async fn mark_overdue_loans(&self, now: DateTime<Utc>) -> AppResult<u64>;
    async fn find_loan(&self, loan_id: LoanId) -> AppResult<Option<Loan>>;
    // ユーザーの未返却（Active / Overdue）の貸出一覧
    async fn find_active_by_user(&self, user_id: UserId) -> AppResult<Vec<Loan>>;
    // すべての未返却の貸出。督促通知の起点に使う
    async fn find_unreturned_all(&self) -> AppResult<Vec<Loan>>;
    async fn availability(&self, book_id: BookId) -> AppResult<Option<AvailabilitySnapshot>>;
}
