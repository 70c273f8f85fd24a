use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{loan::Loan, reservation::Reservation};

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    BorrowConfirmation { loan: Loan },
    ReturnConfirmation { loan: Loan },
    DueSoonReminder { loan: Loan, days_left: i64 },
    OverdueReminder { loan: Loan, days_overdue: i64 },
    ReservationAvailable { reservation: Reservation },
}

// 通知配送はスコープ外のコラボレータ。コミット後にのみ呼び出し、
// 失敗してもトランザクションの結果には影響させない（呼び出し側でログするだけ）。
// リトライは配送側の責務。
#[mockall::automock]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: NotificationEvent) -> AppResult<()>;
}
