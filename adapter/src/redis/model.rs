use kernel::model::id::BookId;

// 在庫スナップショットのキャッシュキー。
// 貸出・返却・予約の状態が変わるたびに PostCommitHook 経由で消す。
pub struct AvailabilityKey(pub BookId);

impl AvailabilityKey {
    pub fn inner(&self) -> String {
        format!("availability:{}", self.0)
    }
}
