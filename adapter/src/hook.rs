use std::sync::Arc;

use async_trait::async_trait;
use derive_new::new;
use kernel::{hook::PostCommitHook, model::id::BookId};
use shared::error::AppResult;

use crate::redis::{model::AvailabilityKey, RedisClient};

// 在庫スナップショットのキャッシュを同期的に破棄するフック。
// 呼び出し側（API 層）が失敗をログするだけで握りつぶす前提。
#[derive(new)]
pub struct SnapshotInvalidator {
    kv: Arc<RedisClient>,
}

#[async_trait]
impl PostCommitHook for SnapshotInvalidator {
    async fn book_changed(&self, book_id: BookId) -> AppResult<()> {
        self.kv.delete(&AvailabilityKey(book_id).inner()).await
    }
}
