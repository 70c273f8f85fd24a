use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use super::id::BookId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Available,
    FullyBorrowed,
    Maintenance,
    Lost,
}

impl BookStatus {
    // Maintenance / Lost は蔵書管理側が設定する上書きステータス。
    // 貸出・返却側からは決して書き換えない。
    pub fn is_override(self) -> bool {
        matches!(self, BookStatus::Maintenance | BookStatus::Lost)
    }
}

#[derive(Debug, Clone)]
pub struct Book {
    pub id: BookId,
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub status: BookStatus,
}

// 読み取り表示用の在庫スナップショット。
// キャッシュ経由で配信してよいのはこの形だけで、貸出判断には使わない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    pub book_id: BookId,
    pub total_copies: i32,
    pub available_copies: i32,
    pub status: BookStatus,
    pub pending_reservations: i64,
}
