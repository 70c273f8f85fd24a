use async_trait::async_trait;
use derive_new::new;
use kernel::notification::{NotificationDispatcher, NotificationEvent};
use shared::error::AppResult;

// メール等の実配送は外部コラボレータの責務。この実装は配送要求を
// 構造化ログとして記録するだけで、本番では差し替えられる。
#[derive(new)]
pub struct LogNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogNotificationDispatcher {
    async fn dispatch(&self, event: NotificationEvent) -> AppResult<()> {
        match &event {
            NotificationEvent::BorrowConfirmation { loan } => {
                tracing::info!(loan_id = %loan.id, user_id = %loan.user_id, "notify: borrow confirmation");
            }
            NotificationEvent::ReturnConfirmation { loan } => {
                tracing::info!(loan_id = %loan.id, user_id = %loan.user_id, "notify: return confirmation");
            }
            NotificationEvent::DueSoonReminder { loan, days_left } => {
                tracing::info!(loan_id = %loan.id, user_id = %loan.user_id, days_left, "notify: due soon reminder");
            }
            NotificationEvent::OverdueReminder { loan, days_overdue } => {
                tracing::info!(loan_id = %loan.id, user_id = %loan.user_id, days_overdue, "notify: overdue reminder");
            }
            NotificationEvent::ReservationAvailable { reservation } => {
                tracing::info!(
                    reservation_id = %reservation.id,
                    user_id = %reservation.user_id,
                    "notify: reservation available"
                );
            }
        }
        Ok(())
    }
}
