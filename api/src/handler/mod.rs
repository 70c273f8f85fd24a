use std::sync::Arc;

use kernel::{
    hook::PostCommitHook,
    model::id::BookId,
    notification::{NotificationDispatcher, NotificationEvent},
};

pub mod admin;
pub mod book;
pub mod health;
pub mod loan;
pub mod reservation;

// コミット後の後処理。キャッシュ無効化フックを同期的に呼んでから通知を流す。
// どちらの失敗も確定済みの操作を巻き戻せないので、ログに残すだけにする。
pub(crate) async fn run_post_commit(
    hooks: &[Arc<dyn PostCommitHook>],
    dispatcher: &Arc<dyn NotificationDispatcher>,
    book_id: BookId,
    events: Vec<NotificationEvent>,
) {
    for hook in hooks {
        if let Err(e) = hook.book_changed(book_id).await {
            tracing::warn!(error.cause_chain = ?e, %book_id, "post-commit hook failed");
        }
    }
    for event in events {
        if let Err(e) = dispatcher.dispatch(event).await {
            tracing::warn!(error.cause_chain = ?e, "notification dispatch failed");
        }
    }
}
