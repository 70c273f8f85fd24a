use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::id::BookId;

// コミット後の明示的なキャッシュ無効化の契約。
// 貸出・返却・予約の状態変更が成功するたびに同期的に呼ぶ。
// 失敗はログに残すだけで、元の操作の成否には影響させない。
#[mockall::automock]
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    async fn book_changed(&self, book_id: BookId) -> AppResult<()>;
}
