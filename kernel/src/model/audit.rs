use serde::Serialize;

use super::{book::BookStatus, id::BookId};

// audit_and_repair が行った修正の報告。観測用で、修正そのものはコミット済み。
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub checked_books: usize,
    pub corrections: Vec<RepairEntry>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairEntry {
    pub book_id: BookId,
    pub available_before: i32,
    pub available_after: i32,
    pub status_before: BookStatus,
    pub status_after: BookStatus,
}
