use strum::{AsRefStr, EnumString};

use super::id::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ActorRole {
    Member,
    Admin,
}

// 認証レイヤ（スコープ外）が検証済みの操作者。コア側では資格情報を再検証しない。
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: UserId,
    pub role: ActorRole,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }
}
