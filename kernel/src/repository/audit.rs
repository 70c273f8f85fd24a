use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{audit::RepairReport, id::BookId};

#[mockall::automock]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    // available_copies を貸出・予約レコードから再計算して修正する冪等な修復処理。
    // ライブ経路と同じ蔵書行ロックを取るので並走しても安全。
    async fn audit_and_repair(&self, book_id: Option<BookId>) -> AppResult<RepairReport>;
}
